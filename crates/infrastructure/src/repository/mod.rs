pub mod agent_repository;
pub mod task_repository;

pub use agent_repository::KvAgentRepository;
pub use task_repository::KvTaskRepository;
