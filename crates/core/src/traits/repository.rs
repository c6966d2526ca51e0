//! 数据仓储层接口定义
//!
//! - `TaskRepository` - 父任务、子任务和区域队列
//! - `AgentRepository` - Agent记录和在线索引
//!
//! 两个接口都是对 [`KvRegistry`](super::KvRegistry) 的类型化封装，
//! 返回 `NetpulseResult<T>` 统一错误处理。

use async_trait::async_trait;
use netpulse_errors::NetpulseResult;

use crate::models::{Agent, SubTask, Task};

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn save_task(&self, task: &Task) -> NetpulseResult<()>;

    async fn get_task(&self, id: &str) -> NetpulseResult<Option<Task>>;

    async fn save_sub_task(&self, sub_task: &SubTask) -> NetpulseResult<()>;

    async fn get_sub_task(&self, id: &str) -> NetpulseResult<Option<SubTask>>;

    /// 按 `task:<parent_id>-` 前缀扫描父任务下的所有子任务
    async fn list_sub_tasks(&self, parent_id: &str) -> NetpulseResult<Vec<SubTask>>;

    /// 所有子任务
    async fn list_all_sub_tasks(&self) -> NetpulseResult<Vec<SubTask>>;

    /// 子任务ID入区域队列尾部
    async fn enqueue(&self, region: &str, sub_task_id: &str) -> NetpulseResult<()>;

    /// 按入队顺序返回区域队列中的ID
    async fn queue_ids(&self, region: &str) -> NetpulseResult<Vec<String>>;

    /// 从区域队列移除指定ID，返回是否存在
    async fn dequeue(&self, region: &str, sub_task_id: &str) -> NetpulseResult<bool>;

    async fn queue_len(&self, region: &str) -> NetpulseResult<usize>;

    /// 注册表中存在队列的所有区域
    async fn queue_regions(&self) -> NetpulseResult<Vec<String>>;
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn save(&self, agent: &Agent) -> NetpulseResult<()>;

    async fn get(&self, id: &str) -> NetpulseResult<Option<Agent>>;

    /// 删除记录，返回是否存在
    async fn delete(&self, id: &str) -> NetpulseResult<bool>;

    async fn list(&self) -> NetpulseResult<Vec<Agent>>;

    async fn mark_active(&self, id: &str) -> NetpulseResult<()>;

    async fn mark_inactive(&self, id: &str) -> NetpulseResult<()>;

    async fn active_ids(&self) -> NetpulseResult<Vec<String>>;
}
