//! # NetPulse API
//!
//! 协调器与区域节点的HTTP接口，基于Axum构建。
//!
//! ## 协调器
//! - `POST /api/checks` - 创建检测任务，按检测目录扇出到目标区域
//! - `GET /api/checks/{id}` - 聚合状态
//! - `/admin/*` - Agent管理、队列总览、区域节点状态（HTTP Basic）
//! - `POST /internal/results/{id}` - 区域节点回传结果（层间令牌）
//!
//! ## 区域节点
//! - `/hub/*` - 协调器调用（层间令牌），`/hub/status` 无需认证
//! - `/agent/*` - Agent拉取、提交、心跳（`X-Agent-Id` + Bearer）
//!
//! ## 响应格式
//!
//! ```json
//! { "success": true, "data": { ... }, "timestamp": "2024-01-01T00:00:00Z" }
//! ```
//!
//! ```json
//! { "error": { "message": "...", "type": "TASK_NOT_FOUND", "code": 404, "timestamp": "..." } }
//! ```
//!
//! `busy`、`offline`、`no_tasks`、`stopped` 都以成功响应返回，放在 `data.status` 中。

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use axum::Router;
use tower::ServiceBuilder;

use middleware::{cors_layer, request_logging, trace_layer};
use routes::{coordinator_routes, hub_routes};

pub use auth::{AdminCredentials, TierVerifier};
pub use routes::{CoordinatorState, HubState};

fn with_common_layers(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(cors_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    )
}

/// 创建协调器应用
pub fn create_coordinator_app(state: CoordinatorState) -> Router {
    with_common_layers(coordinator_routes(state))
}

/// 创建区域节点应用
pub fn create_hub_app(state: HubState) -> Router {
    with_common_layers(hub_routes(state))
}
