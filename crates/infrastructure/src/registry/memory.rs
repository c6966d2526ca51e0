use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use netpulse_core::KvRegistry;
use netpulse_errors::NetpulseResult;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug, Default)]
struct Store {
    values: HashMap<String, Entry>,
    lists: HashMap<String, VecDeque<String>>,
    sets: HashMap<String, BTreeSet<String>>,
}

/// 内存注册表
///
/// 单进程部署和测试使用。过期键在读取时惰性判定，写入时顺带清理。
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    store: Arc<RwLock<Store>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 清理所有已过期的键，返回清理数量
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut store = self.store.write().await;
        let before = store.values.len();
        store.values.retain(|_, entry| entry.is_live(now));
        let purged = before - store.values.len();
        if purged > 0 {
            debug!("内存注册表清理过期键: {}", purged);
        }
        purged
    }
}

/// 按 Redis LRANGE 语义把区间换算为下标
fn normalize_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl KvRegistry for InMemoryRegistry {
    async fn get(&self, key: &str) -> NetpulseResult<Option<String>> {
        let now = Instant::now();
        let store = self.store.read().await;
        Ok(store
            .values
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> NetpulseResult<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        let mut store = self.store.write().await;
        store.values.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> NetpulseResult<bool> {
        let now = Instant::now();
        let mut store = self.store.write().await;
        let value_existed = store
            .values
            .remove(key)
            .is_some_and(|entry| entry.is_live(now));
        let list_existed = store.lists.remove(key).is_some();
        let set_existed = store.sets.remove(key).is_some();
        Ok(value_existed || list_existed || set_existed)
    }

    async fn scan_prefix(&self, prefix: &str) -> NetpulseResult<Vec<(String, String)>> {
        let now = Instant::now();
        let store = self.store.read().await;
        Ok(store
            .values
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.is_live(now))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect())
    }

    async fn list_push(&self, key: &str, value: &str) -> NetpulseResult<usize> {
        let mut store = self.store.write().await;
        let list = store.lists.entry(key.to_string()).or_default();
        list.push_back(value.to_string());
        Ok(list.len())
    }

    async fn list_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> NetpulseResult<Vec<String>> {
        let store = self.store.read().await;
        let Some(list) = store.lists.get(key) else {
            return Ok(Vec::new());
        };
        Ok(match normalize_range(list.len(), start, stop) {
            Some((from, to)) => list.range(from..=to).cloned().collect(),
            None => Vec::new(),
        })
    }

    async fn list_remove(&self, key: &str, value: &str) -> NetpulseResult<usize> {
        let mut store = self.store.write().await;
        let Some(list) = store.lists.get_mut(key) else {
            return Ok(0);
        };
        let before = list.len();
        list.retain(|item| item != value);
        let removed = before - list.len();
        if list.is_empty() {
            store.lists.remove(key);
        }
        Ok(removed)
    }

    async fn list_len(&self, key: &str) -> NetpulseResult<usize> {
        let store = self.store.read().await;
        Ok(store.lists.get(key).map_or(0, VecDeque::len))
    }

    async fn list_keys(&self, prefix: &str) -> NetpulseResult<Vec<String>> {
        let store = self.store.read().await;
        let mut keys: Vec<String> = store
            .lists
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn set_add(&self, key: &str, member: &str) -> NetpulseResult<bool> {
        let mut store = self.store.write().await;
        Ok(store
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn set_remove(&self, key: &str, member: &str) -> NetpulseResult<bool> {
        let mut store = self.store.write().await;
        let Some(set) = store.sets.get_mut(key) else {
            return Ok(false);
        };
        let removed = set.remove(member);
        if set.is_empty() {
            store.sets.remove(key);
        }
        Ok(removed)
    }

    async fn set_members(&self, key: &str) -> NetpulseResult<Vec<String>> {
        let store = self.store.read().await;
        Ok(store
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn ping(&self) -> NetpulseResult<()> {
        Ok(())
    }
}
