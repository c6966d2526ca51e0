#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use headers::{Authorization, HeaderMapExt};
use netpulse_api::{
    create_coordinator_app, create_hub_app, AdminCredentials, CoordinatorState, HubState,
    TierVerifier,
};
use netpulse_core::{
    AgentListing, AgentRegistration, Capability, CoordinatorRelay, CreateAgentRequest,
    CreatedAgent, HubRelay, HubStatus, RelayedResult, SubTask, TierTokenService,
    ISSUER_COORDINATOR, ISSUER_HUB,
};
use netpulse_dispatcher::{
    AgentAdminService, AgentRegistry, AgentRegistryConfig, AssignmentService, CheckService,
    DispatchLocks, AGENT_ID_HEADER,
};
use netpulse_errors::{NetpulseError, NetpulseResult};
use netpulse_infrastructure::{InMemoryRegistry, KvAgentRepository, KvTaskRepository};
use serde_json::Value;
use tower::ServiceExt;

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASSWORD: &str = "s3cret";
pub const RU_SECRET: &str = "ru-secret";
pub const EU_SECRET: &str = "eu-secret";

/// 进程内直连 ru 区域节点的转发实现，eu 区域视为不可达
pub struct LoopbackHubRelay {
    assignment: Arc<AssignmentService>,
    registry: Arc<AgentRegistry>,
}

impl LoopbackHubRelay {
    fn ensure_ru(region: &str) -> NetpulseResult<()> {
        if region == "ru" {
            Ok(())
        } else {
            Err(NetpulseError::upstream(format!("区域 {region} 不可达")))
        }
    }
}

#[async_trait]
impl HubRelay for LoopbackHubRelay {
    async fn assign_sub_task(&self, region: &str, sub_task: &SubTask) -> NetpulseResult<()> {
        Self::ensure_ru(region)?;
        self.assignment.accept_relayed(sub_task.clone()).await.map(|_| ())
    }

    async fn create_agent(
        &self,
        region: &str,
        request: &CreateAgentRequest,
    ) -> NetpulseResult<CreatedAgent> {
        Self::ensure_ru(region)?;
        let (agent, credentials) = self
            .registry
            .register(AgentRegistration {
                name: request.name.clone(),
                region: region.to_string(),
                capabilities: request.capabilities.clone(),
                max_tasks: request.max_tasks,
            })
            .await?;
        Ok(CreatedAgent {
            credentials,
            agent: agent.view(),
        })
    }

    async fn stop_agent(&self, region: &str, agent_id: &str) -> NetpulseResult<()> {
        Self::ensure_ru(region)?;
        self.registry.stop(agent_id).await.map(|_| ())
    }

    async fn list_agents(&self, region: &str) -> NetpulseResult<AgentListing> {
        Self::ensure_ru(region)?;
        self.registry.list().await
    }

    async fn hub_status(&self, region: &str) -> NetpulseResult<HubStatus> {
        Self::ensure_ru(region)?;
        Ok(HubStatus {
            hub_id: "hub-ru-1".to_string(),
            region: region.to_string(),
            agents: self.registry.list().await?.stats,
            pending_tasks: self.assignment.pending_count().await?,
        })
    }
}

#[derive(Default)]
pub struct RecordingCoordinatorRelay {
    pub relayed: Mutex<Vec<(String, RelayedResult)>>,
}

#[async_trait]
impl CoordinatorRelay for RecordingCoordinatorRelay {
    async fn relay_result(&self, sub_task_id: &str, result: &RelayedResult) -> NetpulseResult<()> {
        self.relayed
            .lock()
            .unwrap()
            .push((sub_task_id.to_string(), result.clone()));
        Ok(())
    }
}

/// 协调器 + ru 区域节点，各自使用独立的注册表
pub struct Cluster {
    pub coordinator: Router,
    pub hub: Router,
    pub hub_registry: Arc<AgentRegistry>,
    pub upstream: Arc<RecordingCoordinatorRelay>,
}

impl Cluster {
    pub fn new() -> Self {
        let hub_store = Arc::new(InMemoryRegistry::new());
        let hub_locks = Arc::new(DispatchLocks::new());
        let hub_registry = Arc::new(AgentRegistry::new(
            Arc::new(KvAgentRepository::new(hub_store.clone())),
            hub_locks.clone(),
            AgentRegistryConfig {
                region: "ru".to_string(),
                default_capabilities: Capability::parse_list(&["http", "https", "ping"])
                    .unwrap(),
                default_max_tasks: 5,
                token_secret: "agent-secret".to_string(),
            },
        ));
        let upstream = Arc::new(RecordingCoordinatorRelay::default());
        let assignment = Arc::new(AssignmentService::new(
            Arc::new(KvTaskRepository::new(hub_store, None)),
            hub_registry.clone(),
            hub_locks,
            Some(upstream.clone()),
        ));

        let relay = Arc::new(LoopbackHubRelay {
            assignment: assignment.clone(),
            registry: hub_registry.clone(),
        });
        let coord_store = Arc::new(InMemoryRegistry::new());
        let regions = vec!["ru".to_string(), "eu".to_string()];
        let coordinator_state = CoordinatorState {
            checks: Arc::new(CheckService::new(
                Arc::new(KvTaskRepository::new(coord_store.clone(), None)),
                relay.clone(),
                regions.clone(),
            )),
            admin: Arc::new(AgentAdminService::new(
                Arc::new(KvAgentRepository::new(coord_store)),
                relay,
                regions,
            )),
            admin_credentials: Arc::new(AdminCredentials::new(ADMIN_USER, ADMIN_PASSWORD)),
            tier: TierVerifier::new(
                vec![
                    TierTokenService::new("ru", RU_SECRET, 60),
                    TierTokenService::new("eu", EU_SECRET, 60),
                ],
                ISSUER_HUB,
            ),
        };

        let hub_state = HubState {
            hub_id: "hub-ru-1".to_string(),
            assignment,
            registry: hub_registry.clone(),
            launcher: None,
            tier: TierVerifier::new(
                vec![TierTokenService::new("ru", RU_SECRET, 60)],
                ISSUER_COORDINATOR,
            ),
        };

        Self {
            coordinator: create_coordinator_app(coordinator_state),
            hub: create_hub_app(hub_state),
            hub_registry,
            upstream,
        }
    }

    pub async fn register_agent(&self, name: &str, caps: &[&str]) -> (String, String) {
        let (_, credentials) = self
            .hub_registry
            .register(AgentRegistration {
                name: name.to_string(),
                region: "ru".to_string(),
                capabilities: caps.iter().map(|c| c.to_string()).collect(),
                max_tasks: Some(2),
            })
            .await
            .unwrap();
        (credentials.agent_id, credentials.token)
    }
}

pub fn tier_token(region: &str, secret: &str, issuer: &str) -> String {
    TierTokenService::new(region, secret, 60).issue(issuer).unwrap()
}

/// 请求构造
pub struct Call {
    builder: axum::http::request::Builder,
    body: Body,
}

impl Call {
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            builder: Request::builder().method(method).uri(uri),
            body: Body::empty(),
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn delete(uri: &str) -> Self {
        Self::new(Method::DELETE, uri)
    }

    pub fn json(mut self, value: Value) -> Self {
        self.builder = self
            .builder
            .header(header::CONTENT_TYPE, "application/json");
        self.body = Body::from(value.to_string());
        self
    }

    pub fn raw_json(mut self, text: &'static str) -> Self {
        self.builder = self
            .builder
            .header(header::CONTENT_TYPE, "application/json");
        self.body = Body::from(text);
        self
    }

    pub fn admin(mut self) -> Self {
        if let Some(headers) = self.builder.headers_mut() {
            headers.typed_insert(Authorization::basic(ADMIN_USER, ADMIN_PASSWORD));
        }
        self
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.builder = self
            .builder
            .header(header::AUTHORIZATION, format!("Bearer {token}"));
        self
    }

    pub fn agent(self, agent_id: &str, token: &str) -> Self {
        let mut call = self.bearer(token);
        call.builder = call.builder.header(AGENT_ID_HEADER, agent_id);
        call
    }

    pub async fn send(self, app: &Router) -> (StatusCode, Value) {
        let request = self.builder.body(self.body).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}
