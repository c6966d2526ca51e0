//! 键值注册表接口
//!
//! 所有持久状态都经由此接口读写。注册表自身的一致性保证由具体后端负责，
//! 上层只依赖单键操作的原子性，跨键的一致性由调度层的锁保证。
//!
//! ## 键空间
//!
//! ```text
//! task:<id>        -> 父任务或子任务记录（JSON）
//! agent:<id>       -> Agent记录（JSON）
//! queue:<region>   -> 待处理子任务ID的FIFO列表
//! active_agents    -> 在线Agent ID集合
//! ```

use std::time::Duration;

use async_trait::async_trait;
use netpulse_errors::NetpulseResult;

#[async_trait]
pub trait KvRegistry: Send + Sync {
    async fn get(&self, key: &str) -> NetpulseResult<Option<String>>;

    /// 写入值，`ttl` 为 `None` 时永不过期
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> NetpulseResult<()>;

    /// 删除键，返回键是否存在
    async fn delete(&self, key: &str) -> NetpulseResult<bool>;

    /// 按前缀扫描，返回 (key, value) 列表，顺序不保证
    async fn scan_prefix(&self, prefix: &str) -> NetpulseResult<Vec<(String, String)>>;

    /// 追加到列表尾部，返回追加后的长度
    async fn list_push(&self, key: &str, value: &str) -> NetpulseResult<usize>;

    /// 读取列表区间，语义同 Redis LRANGE（闭区间，负数从尾部计）
    async fn list_range(&self, key: &str, start: isize, stop: isize)
        -> NetpulseResult<Vec<String>>;

    /// 删除列表中所有等于 `value` 的元素，返回删除数量
    async fn list_remove(&self, key: &str, value: &str) -> NetpulseResult<usize>;

    async fn list_len(&self, key: &str) -> NetpulseResult<usize>;

    /// 按前缀列出所有列表键
    async fn list_keys(&self, prefix: &str) -> NetpulseResult<Vec<String>>;

    /// 加入集合，返回是否为新成员
    async fn set_add(&self, key: &str, member: &str) -> NetpulseResult<bool>;

    async fn set_remove(&self, key: &str, member: &str) -> NetpulseResult<bool>;

    async fn set_members(&self, key: &str) -> NetpulseResult<Vec<String>>;

    async fn ping(&self) -> NetpulseResult<()>;
}
