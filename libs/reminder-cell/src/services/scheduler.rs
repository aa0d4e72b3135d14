use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::ReminderError;
use crate::models::{
    ChannelKind, ChannelOutcome, ChannelRequest, DispatchCycleSummary, Reminder,
    ReminderCycleResult,
};
use crate::services::attempts::DeliveryRecorder;
use crate::services::channels;
use crate::services::dispatch::NotificationDispatcher;
use crate::services::recurrence::{self, NextOccurrence};

/// Drives one dispatch cycle: load due (or explicitly named) reminders, then
/// per reminder: resolve channels, dispatch and record each, reschedule and
/// persist. Reminders are processed sequentially and never abort each other.
pub struct ReminderSchedulerService {
    supabase: SupabaseClient,
    dispatcher: NotificationDispatcher,
    recorder: DeliveryRecorder,
    service_role_key: String,
}

impl ReminderSchedulerService {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            supabase: SupabaseClient::new(&config),
            recorder: DeliveryRecorder::new(&config),
            service_role_key: config.supabase_service_role_key.clone(),
            dispatcher: NotificationDispatcher::new(config),
        }
    }

    /// With an explicit id the due filter is bypassed (manual trigger);
    /// without one, every active reminder due at `now` is selected.
    pub async fn run_cycle(
        &self,
        reminder_id: Option<Uuid>,
    ) -> Result<DispatchCycleSummary, ReminderError> {
        let now = Utc::now();

        let reminders = self.load_reminders(reminder_id, now).await?;

        if let Some(id) = reminder_id {
            if reminders.is_empty() {
                return Err(ReminderError::NotFound(id.to_string()));
            }
        }

        info!("Dispatch cycle processing {} reminder(s)", reminders.len());

        let mut results = Vec::with_capacity(reminders.len());
        for reminder in reminders {
            results.push(self.process_reminder(reminder, now).await);
        }

        Ok(DispatchCycleSummary {
            processed: results.len(),
            results,
        })
    }

    async fn load_reminders(
        &self,
        reminder_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reminder>, ReminderError> {
        let path = match reminder_id {
            Some(id) => format!("/rest/v1/reminders?id=eq.{}&active=eq.true", id),
            None => format!(
                "/rest/v1/reminders?active=eq.true&next_trigger_at=lte.{}&next_trigger_at=not.is.null",
                now.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
        };

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(&self.service_role_key), None)
            .await
            .map_err(|e| ReminderError::Database(e.to_string()))?;

        // A malformed row only costs itself, not the cycle.
        let reminders = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<Reminder>(row) {
                Ok(reminder) => Some(reminder),
                Err(e) => {
                    warn!("Skipping undecodable reminder row: {}", e);
                    None
                }
            })
            .collect();

        Ok(reminders)
    }

    async fn process_reminder(&self, reminder: Reminder, now: DateTime<Utc>) -> ReminderCycleResult {
        let requests = resolve_channel_requests(&reminder);

        if requests.is_empty() {
            debug!("Reminder {} resolves to no channels, skipping", reminder.id);
            return ReminderCycleResult {
                reminder_id: reminder.id,
                skipped: true,
                attempts: Vec::new(),
                next_trigger: reminder.next_trigger_at,
                active: reminder.active,
            };
        }

        let mut attempts = Vec::with_capacity(requests.len());
        for request in &requests {
            let result = self.dispatcher.dispatch(request, &reminder).await;

            // One audit row per request, provider failure or not. Recording
            // is best effort and must not stall the remaining channels.
            if let Err(e) = self.recorder.record(&reminder, request, &result, now).await {
                error!(
                    "Failed to record delivery attempt for reminder {}: {}",
                    reminder.id, e
                );
            }

            attempts.push(ChannelOutcome {
                kind: request.kind,
                target: request.target.clone(),
                success: result.success,
                error: result.error,
            });
        }

        // Schedule progression is independent of delivery success; a channel
        // that fails forever must not re-queue the reminder at the same
        // instant.
        let next = recurrence::compute_next(&reminder, now);
        if let Err(e) = self.persist_schedule(&reminder, &next, now).await {
            error!("Failed to update schedule for reminder {}: {}", reminder.id, e);
        }

        ReminderCycleResult {
            reminder_id: reminder.id,
            skipped: false,
            attempts,
            next_trigger: next.next_trigger,
            active: next.active,
        }
    }

    async fn persist_schedule(
        &self,
        reminder: &Reminder,
        next: &NextOccurrence,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let update = json!({
            "last_triggered_at": now,
            "next_trigger_at": next.next_trigger,
            "active": next.active,
            "updated_at": now,
        });

        let path = format!("/rest/v1/reminders?id=eq.{}", reminder.id);
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let _: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(&self.service_role_key),
            Some(update),
            Some(headers),
        ).await?;

        Ok(())
    }
}

/// A non-null `channels` column is the sole source of destinations; the
/// legacy notify flags only apply when it is absent.
fn resolve_channel_requests(reminder: &Reminder) -> Vec<ChannelRequest> {
    match reminder.channels.as_ref().filter(|value| !value.is_null()) {
        Some(raw) => channels::normalize(Some(raw)),
        None => {
            let mut requests = Vec::new();
            if reminder.notify_email {
                requests.push(ChannelRequest::bare(ChannelKind::Email));
            }
            if reminder.notify_push {
                requests.push(ChannelRequest::bare(ChannelKind::Push));
            }
            requests
        }
    }
}
