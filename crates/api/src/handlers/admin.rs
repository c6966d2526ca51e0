use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use netpulse_core::{AgentListing, CreateAgentRequest, CreatedAgent, HubHealth, QueueOverview};
use serde::{Deserialize, Serialize};

use crate::{
    response::{success, ApiResponse, ApiResult},
    routes::CoordinatorState,
};

/// 管理员创建Agent请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCreateAgent {
    pub region: String,
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub max_tasks: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDeleted {
    pub agent_id: String,
    pub deleted: bool,
}

pub async fn create_agent(
    State(state): State<CoordinatorState>,
    payload: Result<Json<AdminCreateAgent>, JsonRejection>,
) -> ApiResult<CreatedAgent> {
    let Json(body) = payload?;
    let request = CreateAgentRequest {
        name: body.name,
        capabilities: body.capabilities,
        max_tasks: body.max_tasks,
    };
    let created = state.admin.create_agent(&body.region, request).await?;
    Ok(ApiResponse::success_with_message(
        created,
        "凭证只返回这一次，请妥善保存",
    ))
}

pub async fn list_agents(State(state): State<CoordinatorState>) -> ApiResult<AgentListing> {
    success(state.admin.list_agents().await?)
}

pub async fn delete_agent(
    State(state): State<CoordinatorState>,
    Path(agent_id): Path<String>,
) -> ApiResult<AgentDeleted> {
    state.admin.delete_agent(&agent_id).await?;
    success(AgentDeleted {
        agent_id,
        deleted: true,
    })
}

pub async fn queue_overview(State(state): State<CoordinatorState>) -> ApiResult<QueueOverview> {
    success(state.checks.queue_overview().await?)
}

pub async fn hub_statuses(
    State(state): State<CoordinatorState>,
) -> ApiResult<BTreeMap<String, HubHealth>> {
    success(state.admin.hub_statuses().await)
}
