pub mod events;
pub mod notifications;
pub mod repositories;
pub mod scheduler;
