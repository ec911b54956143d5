//! Wire format: translation of an [`Event`] into the ingestion API's
//! telemetry envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::breadcrumbs::Breadcrumb;
use crate::event::{Event, Level, ValueMap};

/// Value of the envelope's `source` field.
pub const ENVELOPE_SOURCE: &str = "sdk-rust";

/// `(type, severity)` for a level.
pub fn classify_level(level: Level) -> (&'static str, &'static str) {
    match level {
        Level::Error => ("error", "high"),
        Level::Warning => ("error", "medium"),
        Level::Info => ("info", "low"),
        Level::Debug => ("info", "info"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEnvelope {
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: String,
    pub environment: String,
    pub payload: TelemetryPayload,
    pub timestamp: DateTime<Utc>,
    pub trace_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetryPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ValueMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<ValueMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breadcrumbs: Option<Vec<Breadcrumb>>,
}

impl From<&Event> for TelemetryEnvelope {
    fn from(event: &Event) -> Self {
        let (kind, severity) = classify_level(event.level);
        let exception = event.exception.as_ref();
        let frame = exception.and_then(|e| e.innermost_frame());

        let payload = TelemetryPayload {
            message: event.message.clone(),
            error_type: exception.map(|e| e.ty.clone()),
            error_message: exception.map(|e| e.value.clone()),
            file: frame.map(|f| f.filename.clone()),
            line: frame.and_then(|f| f.line),
            stack_trace: exception.and_then(|e| e.render_stacktrace()),
            context: non_empty(&event.context),
            tags: (!event.tags.is_empty()).then(|| event.tags.clone()),
            extra: non_empty(&event.extra),
            release: event.release.clone(),
            breadcrumbs: (!event.breadcrumbs.is_empty()).then(|| event.breadcrumbs.clone()),
        };

        let trace_id = event
            .context
            .get("trace_id")
            .and_then(|v| v.as_str())
            .unwrap_or(&event.event_id)
            .to_string();

        Self {
            source: ENVELOPE_SOURCE.to_string(),
            kind: kind.to_string(),
            severity: severity.to_string(),
            environment: event.environment.clone(),
            payload,
            timestamp: event.timestamp,
            trace_id,
        }
    }
}

/// Body of a batched request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryBatch {
    pub events: Vec<TelemetryEnvelope>,
}

/// What actually goes on the wire for one delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireBody {
    Single(TelemetryEnvelope),
    Batch(TelemetryBatch),
}

impl WireBody {
    /// One envelope for a single event, a batch object otherwise.
    pub fn from_events(events: &[Event], batched: bool) -> Self {
        match (batched, events) {
            (false, [event]) => WireBody::Single(event.into()),
            _ => WireBody::Batch(TelemetryBatch {
                events: events.iter().map(TelemetryEnvelope::from).collect(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            WireBody::Single(_) => 1,
            WireBody::Batch(batch) => batch.events.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn non_empty(map: &ValueMap) -> Option<ValueMap> {
    (!map.is_empty()).then(|| map.clone())
}
