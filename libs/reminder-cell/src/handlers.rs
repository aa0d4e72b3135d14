use std::sync::Arc;

use axum::{
    extract::{Path, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateReminderRequest, DispatchRequest, UpdateReminderRequest};
use crate::services::{ReminderSchedulerService, ReminderService};

/// Service-level trigger: a scheduled job (or a manual "send now") posts
/// here. An explicit id processes exactly that reminder; an empty body means
/// "everything due now".
#[axum::debug_handler]
pub async fn dispatch_reminders(
    State(config): State<Arc<AppConfig>>,
    body: Option<Json<DispatchRequest>>,
) -> Result<Json<Value>, AppError> {
    if !config.is_configured() {
        return Err(AppError::Internal(
            "Supabase persistence is not configured".to_string(),
        ));
    }

    let request = body.map(|Json(request)| request).unwrap_or_default();
    let reminder_id = match request.reminder_id.as_deref() {
        Some(raw) => Some(
            Uuid::parse_str(raw)
                .map_err(|_| AppError::BadRequest(format!("Invalid reminder id: {}", raw)))?,
        ),
        None => None,
    };

    let service = ReminderSchedulerService::new(config);
    let summary = service
        .run_cycle(reminder_id)
        .await
        .map_err(AppError::from)?;

    match reminder_id {
        // The explicit path answers with that reminder's outcome alone.
        Some(id) => {
            let result = summary
                .results
                .into_iter()
                .next()
                .ok_or_else(|| AppError::NotFound(format!("Reminder not found: {}", id)))?;
            Ok(Json(json!(result)))
        }
        None => Ok(Json(json!(summary))),
    }
}

#[axum::debug_handler]
pub async fn create_reminder(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateReminderRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ReminderService::new(&config);

    let reminder = service
        .create_reminder(&user.id, request, auth.token())
        .await?;

    Ok(Json(json!(reminder)))
}

#[axum::debug_handler]
pub async fn list_reminders(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = ReminderService::new(&config);

    let reminders = service.list_reminders(&user.id, auth.token()).await?;

    Ok(Json(json!({
        "reminders": reminders,
        "total": reminders.len()
    })))
}

#[axum::debug_handler]
pub async fn get_reminder(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(reminder_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = ReminderService::new(&config);

    let reminder = service
        .get_reminder(&user.id, &reminder_id, auth.token())
        .await?;

    Ok(Json(json!(reminder)))
}

#[axum::debug_handler]
pub async fn update_reminder(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(reminder_id): Path<String>,
    Json(request): Json<UpdateReminderRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ReminderService::new(&config);

    let reminder = service
        .update_reminder(&user.id, &reminder_id, request, auth.token())
        .await?;

    Ok(Json(json!(reminder)))
}

#[axum::debug_handler]
pub async fn delete_reminder(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(reminder_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = ReminderService::new(&config);

    service
        .delete_reminder(&user.id, &reminder_id, auth.token())
        .await?;

    Ok(Json(json!({ "deleted": reminder_id })))
}

#[axum::debug_handler]
pub async fn list_notifications(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = ReminderService::new(&config);

    let notifications = service.list_notifications(&user.id, auth.token()).await?;

    Ok(Json(json!({
        "notifications": notifications,
        "total": notifications.len()
    })))
}
