//! 检测任务调度
//!
//! 协调器侧负责创建检测任务并扇出到区域，区域节点侧负责Agent注册、
//! 拉取式分配、结果回收与存活检测，两层之间通过 [`relay`] 中的客户端通信。

pub mod admin;
pub mod agent_registry;
pub mod assignment;
pub mod fan_out;
pub mod liveness;
pub mod locks;
pub mod metrics;
pub mod relay;

pub use admin::AgentAdminService;
pub use agent_registry::{derive_token, AgentRegistry, AgentRegistryConfig};
pub use assignment::{AssignmentService, AGENT_LOST_ERROR};
pub use fan_out::{CheckService, CreateCheckRequest, AUTO_REGION};
pub use liveness::{LivenessMonitor, SweepReport};
pub use locks::{DispatchLocks, KeyedLocks};
pub use relay::{HttpCoordinatorRelay, HttpHubRelay, AGENT_ID_HEADER};
