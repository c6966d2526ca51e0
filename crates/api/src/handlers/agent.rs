//! Agent接口：拉取、提交、心跳

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use netpulse_core::{CheckOutcome, HeartbeatAck, PollOutcome, SubmitAck};

use crate::{
    auth::AgentCredential,
    response::{success, ApiResult},
    routes::HubState,
};

pub async fn poll(
    State(state): State<HubState>,
    credential: AgentCredential,
) -> ApiResult<PollOutcome> {
    success(
        state
            .assignment
            .poll_task(&credential.agent_id, &credential.token)
            .await?,
    )
}

pub async fn submit_result(
    State(state): State<HubState>,
    credential: AgentCredential,
    Path(task_id): Path<String>,
    payload: Result<Json<CheckOutcome>, JsonRejection>,
) -> ApiResult<SubmitAck> {
    let Json(outcome) = payload?;
    success(
        state
            .assignment
            .submit_result(&task_id, &credential.agent_id, &credential.token, outcome)
            .await?,
    )
}

pub async fn heartbeat(
    State(state): State<HubState>,
    credential: AgentCredential,
) -> ApiResult<HeartbeatAck> {
    success(
        state
            .registry
            .heartbeat(&credential.agent_id, &credential.token)
            .await?,
    )
}
