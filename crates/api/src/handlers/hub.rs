//! 区域节点接口（协调器调用，层间令牌认证）

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use netpulse_core::{
    AgentListing, AgentRegistration, AgentView, CreateAgentRequest, CreatedAgent, HubStatus,
    SubTask, TaskResultView,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    auth::TierCaller,
    response::{success, ApiResult},
    routes::HubState,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTaskQueued {
    pub task_id: String,
    /// 重复转发时为 `false`
    pub queued: bool,
}

/// 接收协调器转发的子任务
pub async fn accept_sub_task(
    State(state): State<HubState>,
    TierCaller(_claims): TierCaller,
    payload: Result<Json<SubTask>, JsonRejection>,
) -> ApiResult<SubTaskQueued> {
    let Json(sub_task) = payload?;
    let task_id = sub_task.id.clone();
    let queued = state.assignment.accept_relayed(sub_task).await?;
    success(SubTaskQueued { task_id, queued })
}

/// 创建Agent并在本节点启动执行循环
pub async fn create_agent(
    State(state): State<HubState>,
    TierCaller(_claims): TierCaller,
    payload: Result<Json<CreateAgentRequest>, JsonRejection>,
) -> ApiResult<CreatedAgent> {
    let Json(request) = payload?;
    let registration = AgentRegistration {
        name: request.name,
        region: state.registry.region().to_string(),
        capabilities: request.capabilities,
        max_tasks: request.max_tasks,
    };
    let (agent, credentials) = state.registry.register(registration).await?;

    if let Some(launcher) = &state.launcher {
        if let Err(e) = launcher.launch(&agent, &credentials.token).await {
            warn!("Agent {} 已注册，但执行循环启动失败: {}", agent.id, e);
        }
    }

    success(CreatedAgent {
        credentials,
        agent: agent.view(),
    })
}

pub async fn list_agents(
    State(state): State<HubState>,
    TierCaller(_claims): TierCaller,
) -> ApiResult<AgentListing> {
    success(state.registry.list().await?)
}

pub async fn stop_agent(
    State(state): State<HubState>,
    TierCaller(_claims): TierCaller,
    Path(agent_id): Path<String>,
) -> ApiResult<AgentView> {
    let agent = state.registry.stop(&agent_id).await?;
    success(agent.view())
}

pub async fn get_result(
    State(state): State<HubState>,
    TierCaller(_claims): TierCaller,
    Path(task_id): Path<String>,
) -> ApiResult<TaskResultView> {
    success(state.assignment.get_result(&task_id).await?)
}

/// 节点状态，供协调器探活
pub async fn hub_status(State(state): State<HubState>) -> ApiResult<HubStatus> {
    let listing = state.registry.list().await?;
    success(HubStatus {
        hub_id: state.hub_id.to_string(),
        region: state.registry.region().to_string(),
        agents: listing.stats,
        pending_tasks: state.assignment.pending_count().await?,
    })
}
