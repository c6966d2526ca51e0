pub mod auth;
pub mod config;
pub mod models;
pub mod traits;

pub use auth::*;
pub use config::*;
pub use models::*;
pub use traits::*;

pub use netpulse_errors::{NetpulseError, NetpulseResult};
