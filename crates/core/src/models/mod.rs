//! # 数据模型
//!
//! 检测调度系统的核心数据结构。
//!
//! ## 核心模型
//!
//! ### Task / SubTask - 检测任务
//! 父任务按检测目录扇出为子任务，子任务ID为 `<parent_id>-<check_type>`。
//! 父任务状态由子任务在读取时聚合得出。
//!
//! ### Agent - 探测节点
//! 区域内的执行节点，声明能力集合与并发上限，通过拉取方式领取子任务。
//!
//! ### PollOutcome / HeartbeatAck - 带内状态
//! `busy`、`offline`、`no_tasks`、`stopped` 均为预期状态而非错误。
//!
//! ## 状态管理
//!
//! ### 子任务状态流转
//! ```text
//! Pending → Assigned → Completed
//!                   ↘ Failed
//! ```
//!
//! ### Agent状态流转
//! ```text
//! Online ⇄ Offline
//!    ↘      ↙
//!    Stopped
//! ```
//!
//! 离线Agent只能通过新的心跳恢复在线，已停止的Agent不会恢复。

pub mod agent;
pub mod capability;
pub mod check_type;
pub mod dispatch;
pub mod task;

pub use agent::*;
pub use capability::*;
pub use check_type::*;
pub use dispatch::*;
pub use task::*;
