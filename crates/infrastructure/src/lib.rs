pub mod keys;
pub mod registry;
pub mod repository;

pub use registry::*;
pub use repository::*;
