use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("Reminder not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<ReminderError> for AppError {
    fn from(err: ReminderError) -> Self {
        match err {
            ReminderError::NotFound(msg) => AppError::NotFound(msg),
            ReminderError::ValidationError(msg) => AppError::ValidationError(msg),
            ReminderError::Database(msg) => AppError::Database(msg),
        }
    }
}
