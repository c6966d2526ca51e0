use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CheckType;

/// 检测任务（父任务）
///
/// 创建时按检测目录扇出为若干子任务，自身状态由子任务在读取时聚合得出，
/// 不单独存储。
///
/// # 字段说明
///
/// - `id`: UUID v4 字符串
/// - `target`: 检测目标主机
/// - `region`: 已解析的区域（不会是 `auto`）
/// - `check_types`: 本次请求的检测类型，按目录顺序
/// - `port`: tcp 检测使用的端口
/// - `sub_task_ids`: 子任务ID列表，与 `check_types` 一一对应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub target: String,
    pub region: String,
    pub check_types: Vec<CheckType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub sub_task_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        target: impl Into<String>,
        region: impl Into<String>,
        check_types: Vec<CheckType>,
        port: Option<u16>,
    ) -> Self {
        let id = id.into();
        let sub_task_ids = check_types
            .iter()
            .map(|check| SubTask::derive_id(&id, *check))
            .collect();
        Self {
            id,
            target: target.into(),
            region: region.into(),
            check_types,
            port,
            sub_task_ids,
            created_at: Utc::now(),
        }
    }

    /// 为每个检测类型生成待处理子任务
    pub fn fan_out(&self) -> Vec<SubTask> {
        self.check_types
            .iter()
            .map(|check| SubTask::new(self, *check))
            .collect()
    }
}

/// 子任务状态
///
/// 只允许 pending -> assigned -> {completed | failed} 单向推进。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskStatus {
    Pending,
    Assigned,
    Completed,
    Failed,
}

impl SubTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubTaskStatus::Pending => "pending",
            SubTaskStatus::Assigned => "assigned",
            SubTaskStatus::Completed => "completed",
            SubTaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubTaskStatus::Completed | SubTaskStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            SubTaskStatus::Pending => 0,
            SubTaskStatus::Assigned => 1,
            SubTaskStatus::Completed | SubTaskStatus::Failed => 2,
        }
    }

    /// 是否允许从当前状态迁移到 `next`
    pub fn can_transition_to(&self, next: SubTaskStatus) -> bool {
        next.rank() == self.rank() + 1
    }
}

impl std::fmt::Display for SubTaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 子任务：单个检测类型在单个区域中的执行单元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: String,
    pub parent_task_id: String,
    pub target: String,
    pub check_type: CheckType,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub status: SubTaskStatus,
    pub assigned_agent: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SubTask {
    /// 子任务ID为 `<parent_id>-<check_type>`，同一父任务内不会冲突
    pub fn derive_id(parent_id: &str, check_type: CheckType) -> String {
        format!("{parent_id}-{}", check_type.as_str())
    }

    pub fn new(parent: &Task, check_type: CheckType) -> Self {
        Self {
            id: Self::derive_id(&parent.id, check_type),
            parent_task_id: parent.id.clone(),
            target: parent.target.clone(),
            check_type,
            region: parent.region.clone(),
            port: parent.port,
            status: SubTaskStatus::Pending,
            assigned_agent: None,
            result: None,
            error: None,
            created_at: parent.created_at,
            assigned_at: None,
            completed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == SubTaskStatus::Pending
    }

    pub fn is_assigned_to(&self, agent_id: &str) -> bool {
        self.status != SubTaskStatus::Pending && self.assigned_agent.as_deref() == Some(agent_id)
    }

    /// pending -> assigned
    pub fn assign(&mut self, agent_id: &str, now: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(SubTaskStatus::Assigned) {
            return false;
        }
        self.status = SubTaskStatus::Assigned;
        self.assigned_agent = Some(agent_id.to_string());
        self.assigned_at = Some(now);
        true
    }

    /// 记录执行结果
    ///
    /// 首次调用将 assigned 推进到 completed 或 failed 并返回 `true`；
    /// 已处于终态时只覆盖结果，保留首次的终态并返回 `false`。
    pub fn record_outcome(&mut self, outcome: CheckOutcome, now: DateTime<Utc>) -> bool {
        if self.status == SubTaskStatus::Pending {
            return false;
        }
        let next = if outcome.success {
            SubTaskStatus::Completed
        } else {
            SubTaskStatus::Failed
        };
        let first_terminal = self.status.can_transition_to(next);
        if first_terminal {
            self.status = next;
            self.completed_at = Some(now);
        }
        self.result = outcome.result;
        self.error = outcome.error;
        first_terminal
    }
}

/// 探测执行结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub success: bool,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CheckOutcome {
    pub fn success(result: serde_json::Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// 注册表中 `task:<id>` 下存放的记录，父任务和子任务共用同一前缀
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskRecord {
    Parent(Task),
    Sub(SubTask),
}

impl TaskRecord {
    pub fn id(&self) -> &str {
        match self {
            TaskRecord::Parent(task) => &task.id,
            TaskRecord::Sub(sub) => &sub.id,
        }
    }

    pub fn into_sub_task(self) -> Option<SubTask> {
        match self {
            TaskRecord::Sub(sub) => Some(sub),
            TaskRecord::Parent(_) => None,
        }
    }

    pub fn into_parent(self) -> Option<Task> {
        match self {
            TaskRecord::Parent(task) => Some(task),
            TaskRecord::Sub(_) => None,
        }
    }
}

/// 各状态计数，四个状态始终存在
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub assigned: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn tally<'a>(statuses: impl IntoIterator<Item = &'a SubTaskStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            counts.add(*status);
        }
        counts
    }

    pub fn add(&mut self, status: SubTaskStatus) {
        match status {
            SubTaskStatus::Pending => self.pending += 1,
            SubTaskStatus::Assigned => self.assigned += 1,
            SubTaskStatus::Completed => self.completed += 1,
            SubTaskStatus::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.assigned + self.completed + self.failed
    }
}

/// 检测任务聚合状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckStatusReport {
    pub task_id: String,
    pub target: String,
    pub region: String,
    pub status_summary: StatusCounts,
    pub total: usize,
    pub completed: bool,
    pub sub_tasks: Vec<SubTask>,
}

impl CheckStatusReport {
    /// 由子任务集合聚合出报告，子任务按检测类型目录顺序排列
    pub fn aggregate(task_id: &str, mut sub_tasks: Vec<SubTask>) -> Option<Self> {
        let first = sub_tasks.first()?;
        let target = first.target.clone();
        let region = first.region.clone();
        sub_tasks.sort_by(|a, b| {
            a.check_type
                .cmp(&b.check_type)
                .then_with(|| a.id.cmp(&b.id))
        });

        let status_summary = StatusCounts::tally(sub_tasks.iter().map(|s| &s.status));
        let total = sub_tasks.len();
        Some(Self {
            task_id: task_id.to_string(),
            target,
            region,
            status_summary,
            total,
            completed: status_summary.completed == total,
            sub_tasks,
        })
    }
}

/// 创建检测任务的返回
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckCreated {
    pub task_id: String,
    pub target: String,
    pub region: String,
    pub sub_tasks: Vec<String>,
}
