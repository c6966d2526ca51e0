use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{match_capability, Capability, CheckType, SubTask};

/// Agent状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Online,
    Offline,
    Stopped,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Online => "online",
            AgentStatus::Offline => "offline",
            AgentStatus::Stopped => "stopped",
        }
    }
}

/// 探测Agent
///
/// `token` 仅保存在签发凭证的区域节点上；协调器保存的镜像记录为 `None`，
/// 镜像记录永远无法通过凭证校验。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub region: String,
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub token: Option<String>,
    pub status: AgentStatus,
    pub current_tasks: u32,
    pub max_tasks: u32,
    #[serde(default)]
    pub total_tasks: u64,
    pub created_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        region: impl Into<String>,
        capabilities: Vec<Capability>,
        token: Option<String>,
        max_tasks: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            region: region.into(),
            capabilities,
            token,
            status: AgentStatus::Online,
            current_tasks: 0,
            max_tasks,
            total_tasks: 0,
            created_at: now,
            last_heartbeat: now,
        }
    }

    /// 凭证精确匹配校验
    pub fn verify_token(&self, token: &str) -> bool {
        matches!(&self.token, Some(expected) if expected == token)
    }

    pub fn is_online(&self) -> bool {
        self.status == AgentStatus::Online
    }

    pub fn is_at_capacity(&self) -> bool {
        self.current_tasks >= self.max_tasks
    }

    pub fn supports(&self, check_type: CheckType) -> bool {
        match_capability(&self.capabilities, check_type)
    }

    pub fn can_take(&self, sub_task: &SubTask) -> bool {
        self.supports(sub_task.check_type)
    }

    /// 心跳是否已超时
    pub fn heartbeat_expired(&self, now: DateTime<Utc>, timeout_seconds: u64) -> bool {
        let timeout = i64::try_from(timeout_seconds).unwrap_or(i64::MAX);
        now.signed_duration_since(self.last_heartbeat).num_seconds() > timeout
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_heartbeat = now;
    }

    /// 释放一个负载槽位，下限为0
    pub fn free_slot(&mut self) {
        self.current_tasks = self.current_tasks.saturating_sub(1);
    }

    /// 结果提交后释放槽位并累计完成数
    pub fn release_slot(&mut self) {
        self.free_slot();
        self.total_tasks += 1;
    }

    /// 去除凭证后的对外视图
    pub fn view(&self) -> AgentView {
        AgentView {
            id: self.id.clone(),
            name: self.name.clone(),
            region: self.region.clone(),
            capabilities: self.capabilities.clone(),
            status: self.status,
            current_tasks: self.current_tasks,
            max_tasks: self.max_tasks,
            total_tasks: self.total_tasks,
            created_at: self.created_at,
            last_heartbeat: self.last_heartbeat,
        }
    }
}

/// Agent对外视图，不包含凭证字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentView {
    pub id: String,
    pub name: String,
    pub region: String,
    pub capabilities: Vec<Capability>,
    pub status: AgentStatus,
    pub current_tasks: u32,
    pub max_tasks: u32,
    pub total_tasks: u64,
    pub created_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

impl AgentView {
    /// 由视图恢复无凭证镜像
    pub fn into_mirror(self) -> Agent {
        Agent {
            id: self.id,
            name: self.name,
            region: self.region,
            capabilities: self.capabilities,
            token: None,
            status: self.status,
            current_tasks: self.current_tasks,
            max_tasks: self.max_tasks,
            total_tasks: self.total_tasks,
            created_at: self.created_at,
            last_heartbeat: self.last_heartbeat,
        }
    }
}

/// Agent注册请求
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub max_tasks: Option<u32>,
}

/// 注册成功后返回的凭证，只返回这一次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCredentials {
    pub agent_id: String,
    pub token: String,
}

/// Agent统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub stopped: usize,
    /// 当前在途子任务总数（各Agent current_tasks 之和）
    pub total_tasks: u64,
}

impl AgentStats {
    pub fn collect<'a>(agents: impl IntoIterator<Item = &'a Agent>) -> Self {
        let mut stats = Self::default();
        for agent in agents {
            stats.total += 1;
            match agent.status {
                AgentStatus::Online => stats.online += 1,
                AgentStatus::Offline => stats.offline += 1,
                AgentStatus::Stopped => stats.stopped += 1,
            }
            stats.total_tasks += u64::from(agent.current_tasks);
        }
        stats
    }
}

/// Agent列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentListing {
    pub stats: AgentStats,
    pub agents: Vec<AgentView>,
}

impl AgentListing {
    pub fn from_agents(mut agents: Vec<Agent>) -> Self {
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            stats: AgentStats::collect(&agents),
            agents: agents.iter().map(Agent::view).collect(),
        }
    }
}
