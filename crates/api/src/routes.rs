use std::sync::Arc;

use axum::{
    extract::FromRef,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use netpulse_core::AgentLauncher;
use netpulse_dispatcher::{AgentAdminService, AgentRegistry, AssignmentService, CheckService};

use crate::auth::{require_admin, AdminCredentials, TierVerifier};
use crate::handlers::{admin, agent, checks, health::health_check, hub, internal, root::root_handler};

/// 协调器应用状态
#[derive(Clone)]
pub struct CoordinatorState {
    pub checks: Arc<CheckService>,
    pub admin: Arc<AgentAdminService>,
    pub admin_credentials: Arc<AdminCredentials>,
    /// 校验区域节点签发的令牌，每个区域一个密钥
    pub tier: TierVerifier,
}

impl FromRef<CoordinatorState> for TierVerifier {
    fn from_ref(state: &CoordinatorState) -> Self {
        state.tier.clone()
    }
}

/// 区域节点应用状态
#[derive(Clone)]
pub struct HubState {
    pub hub_id: String,
    pub assignment: Arc<AssignmentService>,
    pub registry: Arc<AgentRegistry>,
    /// 为空时新建Agent需由外部进程以凭证接入
    pub launcher: Option<Arc<dyn AgentLauncher>>,
    /// 校验协调器签发的令牌，只持有本区域密钥
    pub tier: TierVerifier,
}

impl FromRef<HubState> for TierVerifier {
    fn from_ref(state: &HubState) -> Self {
        state.tier.clone()
    }
}

/// 协调器路由
pub fn coordinator_routes(state: CoordinatorState) -> Router {
    let admin_routes = Router::new()
        .route("/admin/agents", get(admin::list_agents).post(admin::create_agent))
        .route("/admin/agents/{id}", delete(admin::delete_agent))
        .route("/admin/queues", get(admin::queue_overview))
        .route("/admin/hubs", get(admin::hub_statuses))
        .route_layer(from_fn_with_state(
            state.admin_credentials.clone(),
            require_admin,
        ));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        // 检测任务
        .route("/api/checks", post(checks::create_check))
        .route("/api/checks/{id}", get(checks::get_check))
        // 区域节点回传
        .route("/internal/results/{id}", post(internal::relay_result))
        .merge(admin_routes)
        .with_state(state)
}

/// 区域节点路由
pub fn hub_routes(state: HubState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // 协调器调用
        .route("/hub/tasks", post(hub::accept_sub_task))
        .route("/hub/agents", get(hub::list_agents).post(hub::create_agent))
        .route("/hub/agents/{id}/stop", post(hub::stop_agent))
        .route("/hub/results/{id}", get(hub::get_result))
        .route("/hub/status", get(hub::hub_status))
        // Agent调用
        .route("/agent/poll", post(agent::poll))
        .route("/agent/tasks/{id}/result", post(agent::submit_result))
        .route("/agent/heartbeat", post(agent::heartbeat))
        .with_state(state)
}
