use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use reminder_cell::router::create_reminder_router;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Vita Clinic API is running!" }))
        .nest("/reminders", create_reminder_router(state))
}
