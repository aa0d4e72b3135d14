use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::{ChannelKind, ChannelRequest, DispatchResult, Reminder};

/// Outbound provider calls are bounded so one unresponsive endpoint cannot
/// stall a whole dispatch cycle.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers notifications to the per-channel provider endpoints.
///
/// Dispatch never returns an error: missing configuration, network failures
/// and provider error statuses all become a failed `DispatchResult` so the
/// caller can record the attempt and keep going.
pub struct NotificationDispatcher {
    client: Client,
    config: Arc<AppConfig>,
}

impl NotificationDispatcher {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let client = Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    pub async fn dispatch(&self, request: &ChannelRequest, reminder: &Reminder) -> DispatchResult {
        // Test seam: forced failures short-circuit before endpoint
        // resolution, so no I/O ever happens for them.
        if request.simulate_failure {
            return DispatchResult::failure(format!(
                "simulated failure for {} channel",
                request.kind
            ));
        }

        match request.kind {
            ChannelKind::Email => self.send_email(request, reminder).await,
            ChannelKind::Push => self.send_push(request, reminder).await,
            ChannelKind::Sms => self.send_sms(request, reminder).await,
            ChannelKind::Webhook => self.send_webhook(request, reminder).await,
        }
    }

    async fn send_email(&self, request: &ChannelRequest, reminder: &Reminder) -> DispatchResult {
        let Some(endpoint) = self.config.email_provider_url.as_deref() else {
            return DispatchResult::failure("EMAIL_PROVIDER_URL is not configured");
        };

        let payload = request.payload.clone().unwrap_or_else(|| {
            json!({
                "to": request.target,
                "subject": email_subject(reminder),
                "message": notification_message(reminder),
                "reminder_id": reminder.id,
            })
        });

        self.post_provider(endpoint, payload).await
    }

    async fn send_push(&self, request: &ChannelRequest, reminder: &Reminder) -> DispatchResult {
        let Some(endpoint) = self.config.push_provider_url.as_deref() else {
            return DispatchResult::failure("PUSH_PROVIDER_URL is not configured");
        };

        let payload = request.payload.clone().unwrap_or_else(|| {
            json!({
                "token": request.target,
                "title": reminder.title.as_deref().unwrap_or("Reminder"),
                "body": notification_message(reminder),
                "reminder_id": reminder.id,
            })
        });

        self.post_provider(endpoint, payload).await
    }

    async fn send_sms(&self, request: &ChannelRequest, reminder: &Reminder) -> DispatchResult {
        let Some(endpoint) = self.config.sms_provider_url.as_deref() else {
            return DispatchResult::failure("SMS_PROVIDER_URL is not configured");
        };

        let payload = request.payload.clone().unwrap_or_else(|| {
            json!({
                "to": request.target,
                "message": notification_message(reminder),
                "reminder_id": reminder.id,
            })
        });

        self.post_provider(endpoint, payload).await
    }

    /// Webhooks prefer the request's own target URL; the configured endpoint
    /// is only a fallback.
    async fn send_webhook(&self, request: &ChannelRequest, reminder: &Reminder) -> DispatchResult {
        let endpoint = request
            .target
            .as_deref()
            .or(self.config.webhook_provider_url.as_deref());
        let Some(endpoint) = endpoint else {
            return DispatchResult::failure(
                "webhook has no target and WEBHOOK_PROVIDER_URL is not configured",
            );
        };

        let payload = request.payload.clone().unwrap_or_else(|| {
            json!({
                "reminder_id": reminder.id,
                "message": notification_message(reminder),
            })
        });

        self.post_provider(endpoint, payload).await
    }

    async fn post_provider(&self, endpoint: &str, payload: Value) -> DispatchResult {
        debug!("Dispatching notification to {}", endpoint);

        let response = match self.client.post(endpoint).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Provider call to {} failed: {}", endpoint, e);
                return DispatchResult {
                    success: false,
                    error: Some(e.to_string()),
                    provider_response: None,
                    payload: Some(payload),
                };
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        // Providers answer JSON when they behave; keep the raw text when
        // they do not. Success is judged on the HTTP status alone.
        let provider_response = if text.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text)))
        };

        if status.is_success() {
            DispatchResult {
                success: true,
                error: None,
                provider_response,
                payload: Some(payload),
            }
        } else {
            warn!("Provider at {} returned HTTP {}", endpoint, status);
            DispatchResult {
                success: false,
                error: Some(format!("HTTP {}", status)),
                provider_response,
                payload: Some(payload),
            }
        }
    }
}

fn notification_message(reminder: &Reminder) -> String {
    reminder.notification_text().unwrap_or_default().to_string()
}

fn email_subject(reminder: &Reminder) -> String {
    match reminder.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => format!("Reminder: {}", title),
        None => "Reminder".to_string(),
    }
}
