use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use netpulse_core::RelayedResult;
use serde::{Deserialize, Serialize};

use crate::{
    auth::TierCaller,
    response::{success, ApiResult},
    routes::CoordinatorState,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayAck {
    pub task_id: String,
    pub first_submission: bool,
}

/// 区域节点上报子任务结果
pub async fn relay_result(
    State(state): State<CoordinatorState>,
    TierCaller(claims): TierCaller,
    Path(task_id): Path<String>,
    payload: Result<Json<RelayedResult>, JsonRejection>,
) -> ApiResult<RelayAck> {
    let Json(relayed) = payload?;
    let first_submission = state
        .checks
        .record_relayed_result(&claims.region, &task_id, relayed)
        .await?;
    success(RelayAck {
        task_id,
        first_submission,
    })
}
