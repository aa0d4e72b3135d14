use serde_json::Value;
use tracing::debug;

use crate::models::{ChannelKind, ChannelRequest};

/// Key variants accepted for the forced-failure test seam.
const SIMULATE_FAILURE_KEYS: [&str; 3] =
    ["simulateFailure", "simulate_failure", "simulate-failure"];

/// Normalizes a reminder's channel configuration into channel requests.
///
/// The column arrives in one of three equivalent shapes: a list of bare kind
/// names, a list of structured descriptors, or a JSON-encoded string of
/// either. Parsing is an ordered chain of attempts; whatever cannot be
/// understood is dropped rather than failing the reminder, and the result
/// preserves input order without deduplicating.
pub fn normalize(raw: Option<&Value>) -> Vec<ChannelRequest> {
    match raw {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => entries.iter().filter_map(parse_entry).collect(),
        Some(Value::String(text)) => {
            if let Some(kind) = ChannelKind::parse(text) {
                return vec![ChannelRequest::bare(kind)];
            }
            match serde_json::from_str::<Value>(text) {
                Ok(decoded) => normalize(Some(&decoded)),
                Err(e) => {
                    debug!("Discarding unparseable channel configuration: {}", e);
                    Vec::new()
                }
            }
        }
        Some(other) => {
            debug!("Discarding channel configuration of unsupported shape: {}", other);
            Vec::new()
        }
    }
}

fn parse_entry(entry: &Value) -> Option<ChannelRequest> {
    match entry {
        Value::String(name) => ChannelKind::parse(name).map(ChannelRequest::bare),
        Value::Object(fields) => {
            let kind = fields
                .get("type")
                .and_then(Value::as_str)
                .and_then(ChannelKind::parse)?;

            Some(ChannelRequest {
                kind,
                target: fields
                    .get("target")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                payload: fields.get("payload").filter(|v| !v.is_null()).cloned(),
                provider: fields
                    .get("provider")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                simulate_failure: SIMULATE_FAILURE_KEYS
                    .iter()
                    .any(|key| fields.get(*key).and_then(Value::as_bool).unwrap_or(false)),
            })
        }
        _ => None,
    }
}
