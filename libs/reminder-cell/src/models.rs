use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    Once,
    Daily,
    Weekly,
    Custom,
}

/// A patient-owned notification schedule, one row of the `reminders` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    pub schedule_type: ScheduleType,
    pub start_time: DateTime<Utc>,
    pub recurrence_interval_minutes: Option<i64>,
    pub days_of_week: Option<Vec<u32>>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub active: bool,
    pub next_trigger_at: Option<DateTime<Utc>>,
    pub last_triggered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub channels: Option<Value>,
    #[serde(default)]
    pub notify_email: bool,
    #[serde(default)]
    pub notify_push: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Reminder {
    /// Notification text is the first non-empty of the legacy content
    /// aliases, checked in fixed priority order.
    pub fn notification_text(&self) -> Option<&str> {
        [&self.title, &self.message, &self.content, &self.body]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .map(str::trim)
            .find(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Push,
    Sms,
    Webhook,
}

impl ChannelKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "email" => Some(Self::Email),
            "push" => Some(Self::Push),
            "sms" => Some(Self::Sms),
            "webhook" => Some(Self::Webhook),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Push => "push",
            Self::Sms => "sms",
            Self::Webhook => "webhook",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized notification destination extracted from a reminder's
/// channel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRequest {
    pub kind: ChannelKind,
    pub target: Option<String>,
    pub payload: Option<Value>,
    pub provider: Option<String>,
    #[serde(default)]
    pub simulate_failure: bool,
}

impl ChannelRequest {
    pub fn bare(kind: ChannelKind) -> Self {
        Self {
            kind,
            target: None,
            payload: None,
            provider: None,
            simulate_failure: false,
        }
    }
}

/// Outcome of one provider call. Dispatchers never error; every failure mode
/// collapses into this shape so the audit row can always be written.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub success: bool,
    pub error: Option<String>,
    pub provider_response: Option<Value>,
    pub payload: Option<Value>,
}

impl DispatchResult {
    /// A failure reached before any I/O: no outbound payload, no response.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            provider_response: None,
            payload: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

/// A durable delivery-attempt row from `reminder_notifications`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderNotification {
    pub id: Uuid,
    pub reminder_id: Uuid,
    pub patient_id: Uuid,
    pub channel: ChannelKind,
    pub target: Option<String>,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub provider: Option<String>,
    pub payload: Option<Value>,
    pub provider_response: Option<Value>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct DispatchRequest {
    #[serde(default, rename = "reminderId", alias = "reminder_id")]
    pub reminder_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelOutcome {
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    pub target: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderCycleResult {
    pub reminder_id: Uuid,
    pub skipped: bool,
    pub attempts: Vec<ChannelOutcome>,
    pub next_trigger: Option<DateTime<Utc>>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchCycleSummary {
    pub processed: usize,
    pub results: Vec<ReminderCycleResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReminderRequest {
    pub title: String,
    pub message: Option<String>,
    pub schedule_type: ScheduleType,
    pub start_time: DateTime<Utc>,
    pub recurrence_interval_minutes: Option<i64>,
    pub days_of_week: Option<Vec<u32>>,
    pub timezone: Option<String>,
    pub channels: Option<Value>,
    pub notify_email: Option<bool>,
    pub notify_push: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReminderRequest {
    pub title: Option<String>,
    pub message: Option<String>,
    pub schedule_type: Option<ScheduleType>,
    pub start_time: Option<DateTime<Utc>>,
    pub recurrence_interval_minutes: Option<i64>,
    pub days_of_week: Option<Vec<u32>>,
    pub timezone: Option<String>,
    pub channels: Option<Value>,
    pub notify_email: Option<bool>,
    pub notify_push: Option<bool>,
    pub active: Option<bool>,
}
