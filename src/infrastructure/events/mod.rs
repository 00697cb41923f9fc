pub mod change_bus;
pub mod tracked_repository;

pub use change_bus::{ChangeBus, ChangeSubscriber};
pub use tracked_repository::TrackedTaskRepository;
