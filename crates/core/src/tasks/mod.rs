pub mod domain;
pub mod task_manager;
pub mod task_registry;
