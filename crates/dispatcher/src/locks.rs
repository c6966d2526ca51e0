use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// 按键分配的异步互斥锁
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        self.handle(key).lock_owned().await
    }

    pub fn len(&self) -> usize {
        match self.locks.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 调度层共享的锁
///
/// 区域锁保证同一区域的扫描和分配是原子的，Agent锁串行化对单个Agent记录的修改。
/// 需要同时持有时，加锁顺序固定为先Agent后区域。
#[derive(Debug, Default)]
pub struct DispatchLocks {
    agents: KeyedLocks,
    regions: KeyedLocks,
}

impl DispatchLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn agent(&self, agent_id: &str) -> OwnedMutexGuard<()> {
        self.agents.lock(agent_id).await
    }

    pub async fn region(&self, region: &str) -> OwnedMutexGuard<()> {
        self.regions.lock(region).await
    }
}
