//! Agent侧接口
//!
//! - `ProbeExecutor` - 探测执行（黑盒，只返回结果记录）
//! - `DispatchClient` - Agent与所属区域节点之间的拉取/提交/心跳通道
//! - `AgentLauncher` - 区域节点为新建Agent启动执行循环

use async_trait::async_trait;
use netpulse_errors::NetpulseResult;

use crate::models::{Agent, CheckOutcome, CheckType, HeartbeatAck, PollOutcome, SubmitAck, SubTask};

#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    /// 执行子任务对应的探测，执行失败以 `success = false` 的结果返回
    async fn execute(&self, sub_task: &SubTask) -> CheckOutcome;

    fn name(&self) -> &str;

    /// 能执行的检测类型，默认全部
    fn supported_types(&self) -> Vec<CheckType> {
        CheckType::CATALOG.to_vec()
    }
}

/// 调用方已持有Agent凭证，实现负责携带凭证
#[async_trait]
pub trait DispatchClient: Send + Sync {
    fn agent_id(&self) -> &str;

    async fn poll(&self) -> NetpulseResult<PollOutcome>;

    async fn submit(&self, task_id: &str, outcome: &CheckOutcome) -> NetpulseResult<SubmitAck>;

    async fn heartbeat(&self) -> NetpulseResult<HeartbeatAck>;
}

#[async_trait]
pub trait AgentLauncher: Send + Sync {
    /// 为刚注册的Agent启动执行循环
    async fn launch(&self, agent: &Agent, token: &str) -> NetpulseResult<()>;

    /// 当前仍在运行的循环数
    async fn running(&self) -> usize;
}
