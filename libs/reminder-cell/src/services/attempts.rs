use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{ChannelRequest, DispatchResult, Reminder};

/// Persists the delivery audit trail: exactly one `reminder_notifications`
/// row per channel request per dispatch cycle, success or failure alike.
pub struct DeliveryRecorder {
    supabase: SupabaseClient,
    service_role_key: String,
}

impl DeliveryRecorder {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            service_role_key: config.supabase_service_role_key.clone(),
        }
    }

    /// A write failure is reported to the caller for logging; it must never
    /// abort the rest of the cycle.
    pub async fn record(
        &self,
        reminder: &Reminder,
        request: &ChannelRequest,
        result: &DispatchResult,
        attempted_at: DateTime<Utc>,
    ) -> Result<()> {
        let row = json!({
            "reminder_id": reminder.id,
            "patient_id": reminder.patient_id,
            "channel": request.kind,
            "target": request.target,
            "status": if result.success { "sent" } else { "failed" },
            "error": result.error,
            "provider": request.provider,
            "payload": result.payload,
            "provider_response": result.provider_response,
            "sent_at": attempted_at,
        });

        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let inserted: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/reminder_notifications",
            Some(&self.service_role_key),
            Some(row),
            Some(headers),
        ).await?;

        debug!(
            "Recorded delivery attempt for reminder {} over {} ({} row)",
            reminder.id,
            request.kind,
            inserted.len()
        );
        Ok(())
    }
}
