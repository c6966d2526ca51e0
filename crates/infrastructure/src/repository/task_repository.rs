use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use netpulse_core::{KvRegistry, SubTask, Task, TaskRecord, TaskRepository};
use netpulse_errors::{NetpulseError, NetpulseResult};
use tracing::warn;

use crate::keys;

/// 基于键值注册表的任务仓储
///
/// 父任务和子任务都以 JSON 保存在 `task:<id>` 下，`task_ttl` 到期后由注册表淘汰。
pub struct KvTaskRepository {
    registry: Arc<dyn KvRegistry>,
    task_ttl: Option<Duration>,
}

impl KvTaskRepository {
    pub fn new(registry: Arc<dyn KvRegistry>, task_ttl: Option<Duration>) -> Self {
        Self { registry, task_ttl }
    }

    async fn put_record(&self, record: &TaskRecord) -> NetpulseResult<()> {
        let payload = serde_json::to_string(record)?;
        self.registry
            .set(&keys::task_key(record.id()), &payload, self.task_ttl)
            .await
    }

    async fn get_record(&self, id: &str) -> NetpulseResult<Option<TaskRecord>> {
        match self.registry.get(&keys::task_key(id)).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// 解析扫描结果中的子任务，跳过无法解析的记录
    fn collect_sub_tasks(entries: Vec<(String, String)>) -> Vec<SubTask> {
        entries
            .into_iter()
            .filter_map(|(key, payload)| match serde_json::from_str::<TaskRecord>(&payload) {
                Ok(record) => record.into_sub_task(),
                Err(e) => {
                    warn!("跳过无法解析的任务记录 {}: {}", key, e);
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl TaskRepository for KvTaskRepository {
    async fn save_task(&self, task: &Task) -> NetpulseResult<()> {
        self.put_record(&TaskRecord::Parent(task.clone())).await
    }

    async fn get_task(&self, id: &str) -> NetpulseResult<Option<Task>> {
        match self.get_record(id).await? {
            Some(TaskRecord::Parent(task)) => Ok(Some(task)),
            Some(TaskRecord::Sub(_)) => Err(NetpulseError::invalid_argument(format!(
                "{id} 是子任务而不是检测任务"
            ))),
            None => Ok(None),
        }
    }

    async fn save_sub_task(&self, sub_task: &SubTask) -> NetpulseResult<()> {
        self.put_record(&TaskRecord::Sub(sub_task.clone())).await
    }

    async fn get_sub_task(&self, id: &str) -> NetpulseResult<Option<SubTask>> {
        Ok(self.get_record(id).await?.and_then(TaskRecord::into_sub_task))
    }

    async fn list_sub_tasks(&self, parent_id: &str) -> NetpulseResult<Vec<SubTask>> {
        let entries = self
            .registry
            .scan_prefix(&keys::sub_task_prefix(parent_id))
            .await?;
        let mut subs = Self::collect_sub_tasks(entries);
        // 前缀可能命中以 `<parent_id>-` 开头的其他父任务的子任务
        subs.retain(|sub| sub.parent_task_id == parent_id);
        subs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(subs)
    }

    async fn list_all_sub_tasks(&self) -> NetpulseResult<Vec<SubTask>> {
        let entries = self.registry.scan_prefix(keys::TASK_PREFIX).await?;
        Ok(Self::collect_sub_tasks(entries))
    }

    async fn enqueue(&self, region: &str, sub_task_id: &str) -> NetpulseResult<()> {
        self.registry
            .list_push(&keys::queue_key(region), sub_task_id)
            .await?;
        Ok(())
    }

    async fn queue_ids(&self, region: &str) -> NetpulseResult<Vec<String>> {
        self.registry
            .list_range(&keys::queue_key(region), 0, -1)
            .await
    }

    async fn dequeue(&self, region: &str, sub_task_id: &str) -> NetpulseResult<bool> {
        Ok(self
            .registry
            .list_remove(&keys::queue_key(region), sub_task_id)
            .await?
            > 0)
    }

    async fn queue_len(&self, region: &str) -> NetpulseResult<usize> {
        self.registry.list_len(&keys::queue_key(region)).await
    }

    async fn queue_regions(&self) -> NetpulseResult<Vec<String>> {
        Ok(self
            .registry
            .list_keys(keys::QUEUE_PREFIX)
            .await?
            .iter()
            .filter_map(|key| keys::region_from_queue_key(key))
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;
    use netpulse_core::{CheckType, SubTaskStatus};

    fn repository() -> KvTaskRepository {
        KvTaskRepository::new(Arc::new(InMemoryRegistry::new()), None)
    }

    #[tokio::test]
    async fn test_save_and_list_sub_tasks() {
        let repo = repository();
        let task = Task::new("p1", "example.com", "ru", CheckType::CATALOG.to_vec(), None);
        repo.save_task(&task).await.unwrap();
        for sub in task.fan_out() {
            repo.save_sub_task(&sub).await.unwrap();
        }

        let other = Task::new("p1-x", "other.org", "ru", vec![CheckType::Ping], None);
        for sub in other.fan_out() {
            repo.save_sub_task(&sub).await.unwrap();
        }

        let subs = repo.list_sub_tasks("p1").await.unwrap();
        assert_eq!(subs.len(), 10);
        assert!(subs.iter().all(|s| s.parent_task_id == "p1"));

        assert_eq!(repo.get_task("p1").await.unwrap().unwrap().target, "example.com");
        let sub = repo.get_sub_task("p1-dns_mx").await.unwrap().unwrap();
        assert_eq!(sub.status, SubTaskStatus::Pending);
        assert!(repo.get_sub_task("p1").await.unwrap().is_none());
        assert!(repo.get_task("p1-http").await.is_err());

        assert_eq!(repo.list_all_sub_tasks().await.unwrap().len(), 11);
    }

    #[tokio::test]
    async fn test_queue_fifo() {
        let repo = repository();
        repo.enqueue("ru", "a").await.unwrap();
        repo.enqueue("ru", "b").await.unwrap();
        repo.enqueue("eu", "c").await.unwrap();

        assert_eq!(repo.queue_ids("ru").await.unwrap(), vec!["a", "b"]);
        assert!(repo.dequeue("ru", "a").await.unwrap());
        assert!(!repo.dequeue("ru", "a").await.unwrap());
        assert_eq!(repo.queue_len("ru").await.unwrap(), 1);
        assert_eq!(repo.queue_regions().await.unwrap(), vec!["eu", "ru"]);
    }
}
