use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::ReminderError;
use crate::models::{
    CreateReminderRequest, Reminder, ReminderNotification, ScheduleType, UpdateReminderRequest,
};

const DAILY_INTERVAL_MINUTES: i64 = 1440;
const NOTIFICATION_HISTORY_LIMIT: i32 = 10;

/// Patient-facing reminder management. Every query carries the caller's own
/// token, so row-level security applies on top of the patient_id predicate.
pub struct ReminderService {
    supabase: SupabaseClient,
}

impl ReminderService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_reminder(
        &self,
        patient_id: &str,
        request: CreateReminderRequest,
        auth_token: &str,
    ) -> Result<Reminder, ReminderError> {
        debug!("Creating reminder for patient: {}", patient_id);

        let title = request.title.trim();
        if title.is_empty() {
            return Err(ReminderError::ValidationError(
                "Reminder title must not be empty".to_string(),
            ));
        }
        validate_schedule(
            request.schedule_type,
            request.recurrence_interval_minutes,
            request.days_of_week.as_deref(),
        )?;

        let interval = match request.schedule_type {
            ScheduleType::Custom => request.recurrence_interval_minutes,
            ScheduleType::Daily => Some(
                request
                    .recurrence_interval_minutes
                    .unwrap_or(DAILY_INTERVAL_MINUTES),
            ),
            _ => None,
        };
        let days_of_week = match request.schedule_type {
            ScheduleType::Weekly => request.days_of_week.unwrap_or_default(),
            _ => Vec::new(),
        };

        let now = Utc::now();
        let reminder_data = json!({
            "patient_id": patient_id,
            "title": title,
            "message": request.message,
            "schedule_type": request.schedule_type,
            "start_time": request.start_time,
            "recurrence_interval_minutes": interval,
            "days_of_week": days_of_week,
            "timezone": request.timezone.unwrap_or_else(|| "UTC".to_string()),
            "channels": request.channels,
            "notify_email": request.notify_email.unwrap_or(true),
            "notify_push": request.notify_push.unwrap_or(false),
            "active": true,
            // The first trigger is the start instant itself.
            "next_trigger_at": request.start_time,
            "created_at": now,
            "updated_at": now,
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/reminders",
            Some(auth_token),
            Some(reminder_data),
            Some(representation_headers()),
        ).await.map_err(|e| ReminderError::Database(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| ReminderError::Database("Failed to create reminder".to_string()))?;

        let reminder: Reminder =
            serde_json::from_value(row).map_err(|e| ReminderError::Database(e.to_string()))?;
        debug!("Reminder created with ID: {}", reminder.id);

        Ok(reminder)
    }

    pub async fn list_reminders(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Vec<Reminder>, ReminderError> {
        debug!("Listing reminders for patient: {}", patient_id);

        let path = format!(
            "/rest/v1/reminders?patient_id=eq.{}&order=next_trigger_at.asc.nullslast,created_at.desc",
            patient_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ReminderError::Database(e.to_string()))?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| ReminderError::Database(e.to_string()))
            })
            .collect()
    }

    pub async fn get_reminder(
        &self,
        patient_id: &str,
        reminder_id: &str,
        auth_token: &str,
    ) -> Result<Reminder, ReminderError> {
        let path = format!(
            "/rest/v1/reminders?id=eq.{}&patient_id=eq.{}",
            reminder_id, patient_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ReminderError::Database(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| ReminderError::NotFound(reminder_id.to_string()))?;

        serde_json::from_value(row).map_err(|e| ReminderError::Database(e.to_string()))
    }

    pub async fn update_reminder(
        &self,
        patient_id: &str,
        reminder_id: &str,
        request: UpdateReminderRequest,
        auth_token: &str,
    ) -> Result<Reminder, ReminderError> {
        debug!("Updating reminder {} for patient {}", reminder_id, patient_id);

        let current = self.get_reminder(patient_id, reminder_id, auth_token).await?;

        let mut update_data = serde_json::Map::new();

        if let Some(title) = request.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(ReminderError::ValidationError(
                    "Reminder title must not be empty".to_string(),
                ));
            }
            update_data.insert("title".to_string(), json!(title));
        }
        if let Some(message) = request.message {
            update_data.insert("message".to_string(), json!(message));
        }
        if let Some(schedule_type) = request.schedule_type {
            validate_schedule(
                schedule_type,
                request
                    .recurrence_interval_minutes
                    .or(current.recurrence_interval_minutes),
                request
                    .days_of_week
                    .as_deref()
                    .or(current.days_of_week.as_deref()),
            )?;
            update_data.insert("schedule_type".to_string(), json!(schedule_type));
        }
        if let Some(start_time) = request.start_time {
            update_data.insert("start_time".to_string(), json!(start_time));
        }
        if let Some(interval) = request.recurrence_interval_minutes {
            if interval <= 0 {
                return Err(ReminderError::ValidationError(
                    "Recurrence interval must be a positive number of minutes".to_string(),
                ));
            }
            update_data.insert("recurrence_interval_minutes".to_string(), json!(interval));
        }
        if let Some(days) = request.days_of_week {
            validate_days_of_week(&days)?;
            update_data.insert("days_of_week".to_string(), json!(days));
        }
        if let Some(timezone) = request.timezone {
            update_data.insert("timezone".to_string(), json!(timezone));
        }
        if let Some(channels) = request.channels {
            update_data.insert("channels".to_string(), channels);
        }
        if let Some(notify_email) = request.notify_email {
            update_data.insert("notify_email".to_string(), json!(notify_email));
        }
        if let Some(notify_push) = request.notify_push {
            update_data.insert("notify_push".to_string(), json!(notify_push));
        }
        if let Some(active) = request.active {
            update_data.insert("active".to_string(), json!(active));
            if active {
                // Re-activation restores the pending trigger, falling back
                // to the start instant.
                let next = current.next_trigger_at.unwrap_or(current.start_time);
                update_data.insert("next_trigger_at".to_string(), json!(next));
            }
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now()));

        let path = format!(
            "/rest/v1/reminders?id=eq.{}&patient_id=eq.{}",
            reminder_id, patient_id
        );
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(representation_headers()),
        ).await.map_err(|e| ReminderError::Database(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| ReminderError::NotFound(reminder_id.to_string()))?;

        serde_json::from_value(row).map_err(|e| ReminderError::Database(e.to_string()))
    }

    pub async fn delete_reminder(
        &self,
        patient_id: &str,
        reminder_id: &str,
        auth_token: &str,
    ) -> Result<(), ReminderError> {
        debug!("Deleting reminder {} for patient {}", reminder_id, patient_id);

        let path = format!(
            "/rest/v1/reminders?id=eq.{}&patient_id=eq.{}",
            reminder_id, patient_id
        );
        let deleted: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(representation_headers()),
        ).await.map_err(|e| ReminderError::Database(e.to_string()))?;

        if deleted.is_empty() {
            return Err(ReminderError::NotFound(reminder_id.to_string()));
        }

        Ok(())
    }

    /// The dashboard's delivery history: the most recent attempts across all
    /// of the patient's reminders.
    pub async fn list_notifications(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Vec<ReminderNotification>, ReminderError> {
        let path = format!(
            "/rest/v1/reminder_notifications?patient_id=eq.{}&order=sent_at.desc.nullslast&limit={}",
            patient_id, NOTIFICATION_HISTORY_LIMIT
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ReminderError::Database(e.to_string()))?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| ReminderError::Database(e.to_string()))
            })
            .collect()
    }
}

fn representation_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

fn validate_schedule(
    schedule_type: ScheduleType,
    recurrence_interval_minutes: Option<i64>,
    days_of_week: Option<&[u32]>,
) -> Result<(), ReminderError> {
    match schedule_type {
        ScheduleType::Weekly => {
            let days = days_of_week.unwrap_or(&[]);
            if days.is_empty() {
                return Err(ReminderError::ValidationError(
                    "Weekly reminders need at least one day of week".to_string(),
                ));
            }
            validate_days_of_week(days)?;
        }
        ScheduleType::Custom => {
            if recurrence_interval_minutes.filter(|minutes| *minutes > 0).is_none() {
                return Err(ReminderError::ValidationError(
                    "Custom reminders need a positive recurrence interval in minutes".to_string(),
                ));
            }
        }
        _ => {}
    }
    Ok(())
}

fn validate_days_of_week(days: &[u32]) -> Result<(), ReminderError> {
    if days.iter().any(|day| *day > 6) {
        return Err(ReminderError::ValidationError(
            "Days of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        ));
    }
    Ok(())
}
