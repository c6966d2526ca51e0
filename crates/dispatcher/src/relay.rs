//! 跨层转发客户端
//!
//! 协调器与区域节点之间的每次调用都携带由区域密钥签发的短期令牌，
//! 响应体为统一的 `{success, data, ...}` 包装，错误体为 `{error: {message, ...}}`。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use netpulse_core::{
    AgentListing, CoordinatorConfig, CoordinatorRelay, CreateAgentRequest, CreatedAgent,
    HubConfig, HubRelay, HubStatus, RelayedResult, SubTask, TierTokenService, ISSUER_COORDINATOR,
    ISSUER_HUB,
};
use netpulse_errors::{NetpulseError, NetpulseResult};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Agent凭证请求头，与 `Authorization: Bearer <token>` 一起使用
pub const AGENT_ID_HEADER: &str = "x-agent-id";

/// 404时对应的资源
pub enum Resource<'a> {
    Task(&'a str),
    Agent(&'a str),
    None,
}

pub fn build_client(timeout: Duration) -> NetpulseResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| NetpulseError::config_error(format!("创建HTTP客户端失败: {e}")))
}

pub fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// 发送请求并解开响应包装，非2xx响应按状态码映射为错误
pub async fn send<T: DeserializeOwned>(
    request: RequestBuilder,
    resource: Resource<'_>,
) -> NetpulseResult<T> {
    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
        let envelope: Envelope<T> = response.json().await?;
        return envelope
            .data
            .ok_or_else(|| NetpulseError::upstream("响应缺少 data 字段"));
    }

    let message = match response.json::<ErrorEnvelope>().await {
        Ok(body) => body.error.message,
        Err(_) => status.to_string(),
    };
    Err(map_status(status, message, resource))
}

fn map_status(status: StatusCode, message: String, resource: Resource<'_>) -> NetpulseError {
    match (status, resource) {
        (StatusCode::UNAUTHORIZED, _) => NetpulseError::unauthorized(message),
        (StatusCode::BAD_REQUEST, _) => NetpulseError::invalid_argument(message),
        (StatusCode::NOT_FOUND, Resource::Task(id)) => NetpulseError::task_not_found(id),
        (StatusCode::NOT_FOUND, Resource::Agent(id)) => NetpulseError::agent_not_found(id),
        (status, _) => NetpulseError::upstream(format!("{status}: {message}")),
    }
}

struct HubEndpoint {
    base_url: String,
    tokens: TierTokenService,
}

/// 协调器到区域节点的HTTP客户端
pub struct HttpHubRelay {
    client: Client,
    hubs: HashMap<String, HubEndpoint>,
}

impl HttpHubRelay {
    pub fn new(config: &CoordinatorConfig) -> NetpulseResult<Self> {
        let hubs = config
            .regions
            .iter()
            .map(|(region, rc)| {
                let endpoint = HubEndpoint {
                    base_url: rc.hub_url.clone(),
                    tokens: TierTokenService::new(
                        region.clone(),
                        &rc.secret,
                        config.token_ttl_seconds,
                    ),
                };
                (region.clone(), endpoint)
            })
            .collect();
        Ok(Self {
            client: build_client(config.request_timeout())?,
            hubs,
        })
    }

    fn request(
        &self,
        region: &str,
        method: reqwest::Method,
        path: &str,
    ) -> NetpulseResult<RequestBuilder> {
        let hub = self
            .hubs
            .get(region)
            .ok_or_else(|| NetpulseError::unknown_region(region))?;
        let token = hub.tokens.issue(ISSUER_COORDINATOR)?;
        let url = join_url(&hub.base_url, path);
        debug!("转发 {} {} (区域 {})", method, url, region);
        Ok(self.client.request(method, url).bearer_auth(token))
    }
}

#[async_trait]
impl HubRelay for HttpHubRelay {
    async fn assign_sub_task(&self, region: &str, sub_task: &SubTask) -> NetpulseResult<()> {
        let request = self
            .request(region, reqwest::Method::POST, "/hub/tasks")?
            .json(sub_task);
        let _: serde_json::Value = send(request, Resource::Task(&sub_task.id)).await?;
        Ok(())
    }

    async fn create_agent(
        &self,
        region: &str,
        request: &CreateAgentRequest,
    ) -> NetpulseResult<CreatedAgent> {
        let builder = self
            .request(region, reqwest::Method::POST, "/hub/agents")?
            .json(request);
        send(builder, Resource::None).await
    }

    async fn stop_agent(&self, region: &str, agent_id: &str) -> NetpulseResult<()> {
        let path = format!("/hub/agents/{agent_id}/stop");
        let request = self.request(region, reqwest::Method::POST, &path)?;
        let _: serde_json::Value = send(request, Resource::Agent(agent_id)).await?;
        Ok(())
    }

    async fn list_agents(&self, region: &str) -> NetpulseResult<AgentListing> {
        let request = self.request(region, reqwest::Method::GET, "/hub/agents")?;
        send(request, Resource::None).await
    }

    async fn hub_status(&self, region: &str) -> NetpulseResult<HubStatus> {
        let request = self.request(region, reqwest::Method::GET, "/hub/status")?;
        send(request, Resource::None).await
    }
}

/// 区域节点到协调器的HTTP客户端
pub struct HttpCoordinatorRelay {
    client: Client,
    base_url: String,
    tokens: TierTokenService,
}

impl HttpCoordinatorRelay {
    pub fn new(
        coordinator_url: impl Into<String>,
        hub: &HubConfig,
        timeout: Duration,
        token_ttl_seconds: u64,
    ) -> NetpulseResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: coordinator_url.into(),
            tokens: TierTokenService::new(hub.region.clone(), &hub.secret, token_ttl_seconds),
        })
    }
}

#[async_trait]
impl CoordinatorRelay for HttpCoordinatorRelay {
    async fn relay_result(&self, sub_task_id: &str, result: &RelayedResult) -> NetpulseResult<()> {
        let token = self.tokens.issue(ISSUER_HUB)?;
        let url = join_url(&self.base_url, &format!("/internal/results/{sub_task_id}"));
        let request = self.client.post(url).bearer_auth(token).json(result);
        let _: serde_json::Value = send(request, Resource::Task(sub_task_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpulse_core::{CheckOutcome, CheckType, RegionConfig, Task};

    fn coordinator_config(hub_url: &str) -> CoordinatorConfig {
        let mut config = CoordinatorConfig::default();
        config.regions.clear();
        config.regions.insert(
            "ru".to_string(),
            RegionConfig {
                hub_url: hub_url.to_string(),
                secret: "ru-secret".to_string(),
            },
        );
        config.request_timeout_seconds = 1;
        config
    }

    fn sub_task() -> SubTask {
        let task = Task::new("t1", "example.com", "ru", vec![CheckType::Http], None);
        task.fan_out().remove(0)
    }

    #[test]
    fn test_map_status() {
        assert!(matches!(
            map_status(StatusCode::UNAUTHORIZED, "x".into(), Resource::None),
            NetpulseError::Unauthorized(_)
        ));
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, "x".into(), Resource::Agent("a1")),
            NetpulseError::AgentNotFound { .. }
        ));
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, "x".into(), Resource::None),
            NetpulseError::UpstreamUnavailable(_)
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_REQUEST, "x".into(), Resource::None),
            NetpulseError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://h:1/", "/hub/tasks"), "http://h:1/hub/tasks");
        assert_eq!(join_url("http://h:1", "/hub/tasks"), "http://h:1/hub/tasks");
    }

    #[tokio::test]
    async fn test_unknown_region_is_rejected_before_sending() {
        let relay = HttpHubRelay::new(&coordinator_config("http://127.0.0.1:9")).unwrap();
        let err = relay.assign_sub_task("eu", &sub_task()).await.unwrap_err();
        assert!(matches!(err, NetpulseError::UnknownRegion { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_hub_is_upstream_error() {
        let relay = HttpHubRelay::new(&coordinator_config("http://127.0.0.1:9")).unwrap();
        let err = relay.assign_sub_task("ru", &sub_task()).await.unwrap_err();
        assert!(err.is_retryable(), "{err}");
    }

    #[tokio::test]
    async fn test_unreachable_coordinator_is_upstream_error() {
        let relay = HttpCoordinatorRelay::new(
            "http://127.0.0.1:9",
            &HubConfig::default(),
            Duration::from_secs(1),
            60,
        )
        .unwrap();
        let result = RelayedResult {
            agent_id: "agent-ru-1".into(),
            outcome: CheckOutcome::failure("timeout"),
        };
        let err = relay.relay_result("t1-http", &result).await.unwrap_err();
        assert!(matches!(err, NetpulseError::UpstreamUnavailable(_)));
    }
}
