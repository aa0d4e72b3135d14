use std::sync::Arc;
use axum::{middleware, routing::{get, post}, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn create_reminder_router(config: Arc<AppConfig>) -> Router {
    // The dispatch endpoint is driven by the external scheduler (or a manual
    // "send now" call), not by a signed-in patient; it stays outside the
    // auth middleware.
    let dispatch_routes = Router::new()
        .route("/dispatch", post(dispatch_reminders))
        .with_state(config.clone());

    let patient_routes = Router::new()
        .route("/", post(create_reminder).get(list_reminders))
        .route("/notifications", get(list_notifications))
        .route("/{id}", get(get_reminder).put(update_reminder).delete(delete_reminder))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config);

    Router::new().merge(dispatch_routes).merge(patient_routes)
}
