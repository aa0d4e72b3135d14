pub mod attempts;
pub mod channels;
pub mod dispatch;
pub mod recurrence;
pub mod reminders;
pub mod scheduler;

pub use attempts::DeliveryRecorder;
pub use dispatch::NotificationDispatcher;
pub use reminders::ReminderService;
pub use scheduler::ReminderSchedulerService;
