pub mod agenda_service;
pub mod notification_service;

pub use agenda_service::AgendaService;
pub use notification_service::NotificationService;
