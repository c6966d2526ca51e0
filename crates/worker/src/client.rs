use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use netpulse_core::{CheckOutcome, DispatchClient, HeartbeatAck, PollOutcome, SubmitAck};
use netpulse_dispatcher::relay::{build_client, join_url, send, Resource};
use netpulse_dispatcher::{AgentRegistry, AssignmentService, AGENT_ID_HEADER};
use netpulse_errors::NetpulseResult;
use reqwest::{Client, RequestBuilder};

/// 与区域节点同进程的Agent直接调用调度服务
pub struct LocalDispatchClient {
    agent_id: String,
    token: String,
    assignment: Arc<AssignmentService>,
    registry: Arc<AgentRegistry>,
}

impl LocalDispatchClient {
    pub fn new(
        agent_id: impl Into<String>,
        token: impl Into<String>,
        assignment: Arc<AssignmentService>,
        registry: Arc<AgentRegistry>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            token: token.into(),
            assignment,
            registry,
        }
    }
}

#[async_trait]
impl DispatchClient for LocalDispatchClient {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    async fn poll(&self) -> NetpulseResult<PollOutcome> {
        self.assignment.poll_task(&self.agent_id, &self.token).await
    }

    async fn submit(&self, task_id: &str, outcome: &CheckOutcome) -> NetpulseResult<SubmitAck> {
        self.assignment
            .submit_result(task_id, &self.agent_id, &self.token, outcome.clone())
            .await
    }

    async fn heartbeat(&self) -> NetpulseResult<HeartbeatAck> {
        self.registry.heartbeat(&self.agent_id, &self.token).await
    }
}

/// 通过区域节点的 `/agent/*` 接口工作的外部Agent
pub struct HttpDispatchClient {
    client: Client,
    hub_url: String,
    agent_id: String,
    token: String,
}

impl HttpDispatchClient {
    pub fn new(
        hub_url: impl Into<String>,
        agent_id: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> NetpulseResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            hub_url: hub_url.into(),
            agent_id: agent_id.into(),
            token: token.into(),
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(join_url(&self.hub_url, path))
            .header(AGENT_ID_HEADER, &self.agent_id)
            .bearer_auth(&self.token)
    }
}

#[async_trait]
impl DispatchClient for HttpDispatchClient {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    async fn poll(&self) -> NetpulseResult<PollOutcome> {
        send(self.post("/agent/poll"), Resource::Agent(&self.agent_id)).await
    }

    async fn submit(&self, task_id: &str, outcome: &CheckOutcome) -> NetpulseResult<SubmitAck> {
        let request = self
            .post(&format!("/agent/tasks/{task_id}/result"))
            .json(outcome);
        send(request, Resource::Task(task_id)).await
    }

    async fn heartbeat(&self) -> NetpulseResult<HeartbeatAck> {
        send(self.post("/agent/heartbeat"), Resource::Agent(&self.agent_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpulse_errors::NetpulseError;

    #[tokio::test]
    async fn test_http_client_unreachable_hub() {
        let client = HttpDispatchClient::new(
            "http://127.0.0.1:9",
            "agent-ru-00000001",
            "token",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.agent_id(), "agent-ru-00000001");
        let err = client.poll().await.unwrap_err();
        assert!(matches!(err, NetpulseError::UpstreamUnavailable(_)));
    }
}
