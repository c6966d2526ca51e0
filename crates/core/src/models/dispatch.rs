use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{
    AgentCredentials, AgentStats, AgentView, CheckOutcome, StatusCounts, SubTask, SubTaskStatus,
};

/// 拉取任务的带内结果
///
/// `busy`、`offline`、`no_tasks` 是预期状态，不作为错误返回。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollOutcome {
    Assigned { task: SubTask },
    Busy,
    Offline,
    NoTasks,
}

impl PollOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollOutcome::Assigned { .. } => "assigned",
            PollOutcome::Busy => "busy",
            PollOutcome::Offline => "offline",
            PollOutcome::NoTasks => "no_tasks",
        }
    }
}

/// 心跳应答
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HeartbeatAck {
    Online,
    Stopped,
}

/// 结果提交应答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAck {
    pub task_id: String,
    pub status: SubTaskStatus,
    /// 是否为首次进入终态
    pub first_submission: bool,
}

/// 子任务结果视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResultView {
    pub task_id: String,
    pub status: SubTaskStatus,
    pub assigned_agent: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl From<&SubTask> for TaskResultView {
    fn from(sub: &SubTask) -> Self {
        Self {
            task_id: sub.id.clone(),
            status: sub.status,
            assigned_agent: sub.assigned_agent.clone(),
            result: sub.result.clone(),
            error: sub.error.clone(),
        }
    }
}

/// 区域节点上报给协调器的子任务结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayedResult {
    pub agent_id: String,
    #[serde(flatten)]
    pub outcome: CheckOutcome,
}

/// 协调器请求区域节点创建Agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub max_tasks: Option<u32>,
}

/// 区域节点创建Agent的结果
///
/// `credentials` 只交给调用方一次，`agent` 为不含凭证的视图。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedAgent {
    pub credentials: AgentCredentials,
    pub agent: AgentView,
}

/// 区域节点状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubStatus {
    pub hub_id: String,
    pub region: String,
    pub agents: AgentStats,
    pub pending_tasks: usize,
}

/// 协调器视角下某个区域节点的可达性
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HubHealth {
    Reachable { status: HubStatus },
    Unreachable { message: String },
}

/// 队列总览
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueOverview {
    /// 区域 -> 待处理队列长度
    pub queues: BTreeMap<String, usize>,
    pub counts: StatusCounts,
    pub total_sub_tasks: usize,
}
