//! Reliable, best-effort event delivery.
//!
//! Producers push events into a bounded in-memory queue without blocking.
//! A background tokio task flushes the queue on a timer, or earlier once the
//! flush threshold is reached, and retries transient failures with
//! exponential backoff. Nothing is persisted: events still queued when the
//! process exits are lost.
//!
//! * `dsn`: connection string parsing.
//! * `envelope`: the JSON wire format.
//! * `sink`: the `EventSink` seam and its HTTP implementation.
//! * `retry`: backoff policy and the retry loop.
//! * `queue`: the bounded queue.
//! * `worker`: the `Transport` itself.

pub mod dsn;
pub mod envelope;
pub mod queue;
pub mod retry;
pub mod sink;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use dsn::Dsn;
pub use envelope::{classify_level, TelemetryBatch, TelemetryEnvelope, TelemetryPayload, WireBody};
pub use queue::EventQueue;
pub use retry::{deliver_with_retry, DeliveryOutcome, RetryPolicy};
pub use sink::{DeliveryError, EventSink, HttpSink};
pub use worker::{FlushReport, Transport, TransportConfig, TransportState, TransportStats};

/// How queued events are grouped into requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    /// One request per event, as the ingestion API expects. Flushes start as
    /// soon as an event is queued.
    #[default]
    Immediate,
    /// Up to `batch_size` events per request, as `{"events": [...]}`.
    Batched,
}
