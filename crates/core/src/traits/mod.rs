pub mod executor;
pub mod registry;
pub mod relay;
pub mod repository;

pub use executor::*;
pub use registry::*;
pub use relay::*;
pub use repository::*;
