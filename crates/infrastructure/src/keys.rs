//! 注册表键命名

pub const TASK_PREFIX: &str = "task:";
pub const AGENT_PREFIX: &str = "agent:";
pub const QUEUE_PREFIX: &str = "queue:";
pub const ACTIVE_AGENTS: &str = "active_agents";

pub fn task_key(id: &str) -> String {
    format!("{TASK_PREFIX}{id}")
}

/// 父任务下所有子任务的扫描前缀，末尾的 `-` 排除父任务本身
pub fn sub_task_prefix(parent_id: &str) -> String {
    format!("{TASK_PREFIX}{parent_id}-")
}

pub fn agent_key(id: &str) -> String {
    format!("{AGENT_PREFIX}{id}")
}

pub fn queue_key(region: &str) -> String {
    format!("{QUEUE_PREFIX}{region}")
}

pub fn region_from_queue_key(key: &str) -> Option<&str> {
    key.strip_prefix(QUEUE_PREFIX)
}
