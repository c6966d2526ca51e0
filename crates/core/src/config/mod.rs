//! 配置管理
//!
//! TOML文件 + `NETPULSE_` 前缀环境变量分层加载，加载后统一校验。

pub mod app_config;
pub mod sections;
pub mod validation;

pub use app_config::*;
pub use sections::*;
pub use validation::*;
