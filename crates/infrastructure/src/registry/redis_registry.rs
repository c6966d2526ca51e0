use std::time::Duration;

use async_trait::async_trait;
use netpulse_core::KvRegistry;
use netpulse_errors::{NetpulseError, NetpulseResult};
use redis::aio::ConnectionManager;
use tracing::{debug, error, info, instrument};

const SCAN_COUNT: usize = 500;
const MGET_CHUNK: usize = 100;

/// Redis注册表
///
/// 基于 `ConnectionManager`，断线后自动重连。
#[derive(Clone)]
pub struct RedisRegistry {
    conn: ConnectionManager,
}

impl RedisRegistry {
    pub async fn connect(redis_url: &str) -> NetpulseResult<Self> {
        info!("连接Redis注册表: {}", redis_url);
        let client = redis::Client::open(redis_url)
            .map_err(|e| NetpulseError::config_error(format!("无效的Redis地址: {e}")))?;
        let conn = client.get_connection_manager().await?;
        let registry = Self { conn };
        registry.ping().await?;
        info!("Redis注册表连接成功");
        Ok(registry)
    }

    fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }

    async fn scan_keys(&self, pattern: &str) -> NetpulseResult<Vec<String>> {
        let mut conn = self.connection();
        let mut keys: Vec<String> = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(|e| {
                    error!("Redis SCAN失败 pattern={}: {}", pattern, e);
                    NetpulseError::from(e)
                })?;
            keys.extend(batch);
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

/// 转义 glob 特殊字符，保证前缀按字面匹配
fn glob_escape(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('*');
    escaped
}

#[async_trait]
impl KvRegistry for RedisRegistry {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> NetpulseResult<Option<String>> {
        let mut conn = self.connection();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> NetpulseResult<()> {
        let mut conn = self.connection();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis().max(1) as u64);
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> NetpulseResult<bool> {
        let mut conn = self.connection();
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    #[instrument(skip(self))]
    async fn scan_prefix(&self, prefix: &str) -> NetpulseResult<Vec<(String, String)>> {
        let keys = self.scan_keys(&glob_escape(prefix)).await?;
        debug!("Redis SCAN prefix={} 命中 {} 个键", prefix, keys.len());
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.connection();
        let mut pairs = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(MGET_CHUNK) {
            let values: Vec<Option<String>> =
                redis::cmd("MGET").arg(chunk).query_async(&mut conn).await?;
            // 扫描与读取之间过期的键返回 nil，直接跳过
            pairs.extend(
                chunk
                    .iter()
                    .zip(values)
                    .filter_map(|(key, value)| value.map(|v| (key.clone(), v))),
            );
        }
        Ok(pairs)
    }

    async fn list_push(&self, key: &str, value: &str) -> NetpulseResult<usize> {
        let mut conn = self.connection();
        let len: usize = redis::cmd("RPUSH")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    async fn list_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> NetpulseResult<Vec<String>> {
        let mut conn = self.connection();
        let items: Vec<String> = redis::cmd("LRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await?;
        Ok(items)
    }

    async fn list_remove(&self, key: &str, value: &str) -> NetpulseResult<usize> {
        let mut conn = self.connection();
        let removed: usize = redis::cmd("LREM")
            .arg(key)
            .arg(0)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(removed)
    }

    async fn list_len(&self, key: &str) -> NetpulseResult<usize> {
        let mut conn = self.connection();
        let len: usize = redis::cmd("LLEN").arg(key).query_async(&mut conn).await?;
        Ok(len)
    }

    async fn list_keys(&self, prefix: &str) -> NetpulseResult<Vec<String>> {
        self.scan_keys(&glob_escape(prefix)).await
    }

    async fn set_add(&self, key: &str, member: &str) -> NetpulseResult<bool> {
        let mut conn = self.connection();
        let added: i64 = redis::cmd("SADD")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(added > 0)
    }

    async fn set_remove(&self, key: &str, member: &str) -> NetpulseResult<bool> {
        let mut conn = self.connection();
        let removed: i64 = redis::cmd("SREM")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn set_members(&self, key: &str) -> NetpulseResult<Vec<String>> {
        let mut conn = self.connection();
        let mut members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        members.sort();
        Ok(members)
    }

    async fn ping(&self) -> NetpulseResult<()> {
        let mut conn = self.connection();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(NetpulseError::registry(format!("Redis PING 返回异常: {pong}")));
        }
        Ok(())
    }
}
