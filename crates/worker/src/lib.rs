//! 探测Agent
//!
//! Agent按 [`BackoffPolicy`] 的节奏向所属区域节点拉取子任务，交给 [`ProbeExecutor`]
//! 执行后提交结果。区域节点内创建的Agent由 [`InProcessAgentLauncher`] 启动。
//!
//! [`ProbeExecutor`]: netpulse_core::ProbeExecutor

pub mod agent;
pub mod backoff;
pub mod client;
pub mod launcher;
pub mod probes;

pub use agent::{AgentExit, AgentWorker};
pub use backoff::BackoffPolicy;
pub use client::{HttpDispatchClient, LocalDispatchClient};
pub use launcher::InProcessAgentLauncher;
pub use probes::{HttpProbe, SimulatedProbe};
