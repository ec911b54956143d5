// codewarden-core/src/lib.rs
//! # CodeWarden Core Library
//!
//! `codewarden-core` is the Rust SDK for the CodeWarden error-tracking
//! service. It captures errors and messages, scrubs personally identifiable
//! information out of them, and delivers them to the ingestion API in the
//! background.
//!
//! ## Modules
//!
//! * `config`: `PatternRule`s and `PatternConfig`, including the embedded default PII patterns.
//! * `sanitizers`: compilation and process-wide caching of pattern sets.
//! * `engine`: the `Redactor` trait (string, JSON and event scrubbing).
//! * `engines`: the `Airlock`, the regex-backed `Redactor`.
//! * `event`: the typed `Event` model.
//! * `builder`: event construction, stack-trace parsing and runtime info.
//! * `breadcrumbs`: the bounded breadcrumb buffer.
//! * `transport`: DSN parsing, the wire envelope, the HTTP sink, retries and the background worker.
//! * `options`: `ClientOptions`.
//! * `client`: the `Client` facade.
//! * `global`: an optional process-wide client.
//! * `integrations`: request instrumentation and the panic hook.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use codewarden_core::{Client, ClientOptions, Level};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Client::init(ClientOptions::new("https://cw_live_key@ingest.example.com"))?;
//!     client.set_user(Some("u-42"), None, None);
//!
//!     let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full for jane@example.com");
//!     let event_id = client.capture_exception(&err);
//!     client.capture_message("checkout started", Level::Info);
//!     println!("captured {}", event_id);
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Construction returns [`WardenError`] for bad DSNs, bad patterns and bad
//! options. Capture calls never fail; delivery problems are logged through
//! the `log` facade and counted in [`TransportStats`].
//!
//! ---
//! License: MIT OR APACHE 2.0

pub mod breadcrumbs;
pub mod builder;
pub mod client;
pub mod config;
pub mod engine;
pub mod engines;
pub mod errors;
pub mod event;
pub mod global;
pub mod integrations;
pub mod options;
pub mod sanitizers;
pub mod transport;

/// Pattern configuration.
pub use config::{merge_rules, PatternConfig, PatternRule, DEFAULT_MASK, MAX_PATTERN_LENGTH};

pub use errors::{WardenError, WardenResult};

pub use engine::{Redactor, MAX_SCRUB_DEPTH};
pub use engines::airlock::{Airlock, ScrubSummaryItem};
pub use sanitizers::compiler::{compile_rules, get_or_compile_rules, CompiledPattern, CompiledPatterns};

/// The event model and its construction.
pub use breadcrumbs::Breadcrumb;
pub use builder::{parse_stacktrace, runtime_info, CaptureRequest, EventBuilder, Scope};
pub use event::{Event, ExceptionInfo, Level, StackFrame, ValueMap};

pub use transport::{
    DeliveryError, Dsn, EventSink, FlushReport, HttpSink, SendMode, Transport, TransportConfig, TransportState,
    TransportStats, WireBody,
};

pub use client::Client;
pub use integrations::{install_panic_hook, RequestInfo, RequestIntegration, RequestTimer, RequestTracker};
pub use options::ClientOptions;
