pub mod memory;
pub mod redis_registry;

use std::sync::Arc;

use netpulse_core::{KvRegistry, RegistryBackend, RegistryConfig};
use netpulse_errors::NetpulseResult;
use tracing::info;

pub use memory::InMemoryRegistry;
pub use redis_registry::RedisRegistry;

/// 按配置创建注册表
pub async fn create_registry(config: &RegistryConfig) -> NetpulseResult<Arc<dyn KvRegistry>> {
    match config.backend {
        RegistryBackend::Memory => {
            info!("使用内存注册表");
            Ok(Arc::new(InMemoryRegistry::new()))
        }
        RegistryBackend::Redis => Ok(Arc::new(RedisRegistry::connect(&config.redis_url).await?)),
    }
}
