//! 跨层转发接口
//!
//! 协调器 ⇄ 区域节点之间的调用。每一跳只使用自己持有的区域密钥签发短期令牌，
//! 不转发不属于自己的凭证。

use async_trait::async_trait;
use netpulse_errors::NetpulseResult;

use crate::models::{
    AgentListing, CreateAgentRequest, CreatedAgent, HubStatus, RelayedResult, SubTask,
};

/// 协调器 -> 区域节点
#[async_trait]
pub trait HubRelay: Send + Sync {
    /// 把子任务交给区域节点入队
    async fn assign_sub_task(&self, region: &str, sub_task: &SubTask) -> NetpulseResult<()>;

    async fn create_agent(
        &self,
        region: &str,
        request: &CreateAgentRequest,
    ) -> NetpulseResult<CreatedAgent>;

    async fn stop_agent(&self, region: &str, agent_id: &str) -> NetpulseResult<()>;

    async fn list_agents(&self, region: &str) -> NetpulseResult<AgentListing>;

    async fn hub_status(&self, region: &str) -> NetpulseResult<HubStatus>;
}

/// 区域节点 -> 协调器
#[async_trait]
pub trait CoordinatorRelay: Send + Sync {
    async fn relay_result(&self, sub_task_id: &str, result: &RelayedResult)
        -> NetpulseResult<()>;
}
