use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use netpulse_core::{CheckCreated, CheckStatusReport};
use netpulse_dispatcher::CreateCheckRequest;

use crate::{
    response::{success, ApiResult},
    routes::CoordinatorState,
};

/// 创建检测任务
pub async fn create_check(
    State(state): State<CoordinatorState>,
    payload: Result<Json<CreateCheckRequest>, JsonRejection>,
) -> ApiResult<CheckCreated> {
    let Json(request) = payload?;
    success(state.checks.create_check(request).await?)
}

/// 查询检测任务的聚合状态
pub async fn get_check(
    State(state): State<CoordinatorState>,
    Path(task_id): Path<String>,
) -> ApiResult<CheckStatusReport> {
    success(state.checks.get_check_status(&task_id).await?)
}
