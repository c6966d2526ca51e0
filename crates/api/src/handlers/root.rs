use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::routes::CoordinatorState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub status: String,
    pub regions: Vec<String>,
    pub endpoints: Vec<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// 根路径：服务信息与可用区域
pub async fn root_handler(State(state): State<CoordinatorState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "netpulse".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
        regions: state.checks.regions().to_vec(),
        endpoints: [
            "POST /api/checks",
            "GET /api/checks/{id}",
            "GET /admin/agents",
            "GET /admin/queues",
            "GET /admin/hubs",
            "GET /health",
        ]
        .iter()
        .map(|e| e.to_string())
        .collect(),
        timestamp: chrono::Utc::now(),
    })
}
