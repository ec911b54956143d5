// codewarden-core/src/client.rs
//! The client facade.
//!
//! A [`Client`] owns one Airlock, one event builder with its ambient scope,
//! and one [`Transport`]. It is cheap to clone; clones share everything.
//!
//! Capture calls are synchronous, never block on the network and never
//! return an error. They always return the new event's id, even when the
//! event is vetoed by `before_send` or dropped by the transport.
//!
//! License: MIT OR APACHE 2.0

use log::{debug, error, info};
use serde_json::Value;
use std::cell::Cell;
use std::error::Error as StdError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::breadcrumbs::Breadcrumb;
use crate::builder::{CaptureRequest, EventBuilder, Scope};
use crate::engine::Redactor;
use crate::engines::airlock::Airlock;
use crate::errors::WardenResult;
use crate::event::{Event, Level, ValueMap};
use crate::options::ClientOptions;
use crate::transport::{Dsn, EventSink, FlushReport, HttpSink, Transport, TransportState, TransportStats};

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
}

/// Whether this thread is inside [`Client::capture_event`]. The panic hook
/// checks it so a panicking `before_send` is not captured again.
pub(crate) fn capture_in_progress() -> bool {
    CAPTURING.with(Cell::get)
}

/// Marks the current thread as capturing until dropped.
struct CaptureGuard {
    previous: bool,
}

impl CaptureGuard {
    fn enter() -> Self {
        Self {
            previous: CAPTURING.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CAPTURING.with(|flag| flag.set(self.previous));
    }
}

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    options: ClientOptions,
    dsn: Dsn,
    airlock: Airlock,
    builder: EventBuilder,
    scope: RwLock<Scope>,
    transport: Transport,
    closed: AtomicBool,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("dsn", &self.inner.dsn)
            .field("environment", &self.inner.options.environment)
            .field("transport", &self.inner.transport)
            .finish()
    }
}

impl Client {
    /// Validates `options`, compiles the patterns and starts the HTTP
    /// transport on the current tokio runtime.
    pub fn init(options: ClientOptions) -> WardenResult<Self> {
        let dsn = options.validate()?;
        let sink = HttpSink::new(&dsn, options.timeout())?;
        Self::with_sink(options, Arc::new(sink))
    }

    /// Like [`Client::init`], delivering through `sink` instead of HTTP.
    pub fn with_sink(options: ClientOptions, sink: Arc<dyn EventSink>) -> WardenResult<Self> {
        let dsn = options.validate()?;
        let airlock = Airlock::from_parts(
            options.custom_patterns(),
            &options.enable_patterns,
            &options.disable_patterns,
        )?;
        let transport = Transport::start(options.transport_config(), sink)?;
        let builder = EventBuilder::new(options.environment.clone(), options.release.clone());
        let scope = Scope::with_max_breadcrumbs(options.max_breadcrumbs);

        info!(
            "CodeWarden client initialized for {} (environment: {}, scrubbing: {}).",
            dsn, options.environment, options.enable_pii_scrubbing
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                options,
                dsn,
                airlock,
                builder,
                scope: RwLock::new(scope),
                transport,
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    pub fn dsn(&self) -> &Dsn {
        &self.inner.dsn
    }

    pub fn airlock(&self) -> &Airlock {
        &self.inner.airlock
    }

    /// Captures `err` as an `error` event.
    pub fn capture_exception<E: StdError + ?Sized>(&self, err: &E) -> String {
        self.capture_event(CaptureRequest::from_error(err))
    }

    pub fn capture_message(&self, message: impl Into<String>, level: Level) -> String {
        self.capture_event(CaptureRequest::message(message, level))
    }

    /// Builds, scrubs and enqueues one event. Returns its id.
    pub fn capture_event(&self, request: CaptureRequest) -> String {
        let _capturing = CaptureGuard::enter();
        let event = {
            let scope = self.inner.scope.read().unwrap_or_else(PoisonError::into_inner);
            self.inner.builder.build(&scope, request)
        };
        let event_id = event.event_id.clone();
        let level = event.level;

        let event = if self.inner.options.enable_pii_scrubbing {
            self.inner.airlock.scrub_event(event)
        } else {
            event
        };

        let Some(event) = self.run_before_send(event) else {
            debug!("Event {} dropped by before_send.", event_id);
            return event_id;
        };

        if self.inner.transport.send(event) && self.inner.options.debug {
            debug!("Queued {} event {}.", level, event_id);
        }
        event_id
    }

    fn run_before_send(&self, event: Event) -> Option<Event> {
        let Some(hook) = &self.inner.options.before_send else {
            return Some(event);
        };
        match catch_unwind(AssertUnwindSafe(|| hook(event))) {
            Ok(result) => result,
            Err(_) => {
                error!("before_send panicked; dropping the event.");
                None
            }
        }
    }

    /// Merges `context` into the ambient context of future events.
    pub fn set_context(&self, context: ValueMap) {
        let mut scope = self.inner.scope.write().unwrap_or_else(PoisonError::into_inner);
        scope.context.extend(context);
    }

    /// Sets whichever of `user_id`, `email` and `username` are given.
    pub fn set_user(&self, id: Option<&str>, email: Option<&str>, username: Option<&str>) {
        let mut scope = self.inner.scope.write().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in [("user_id", id), ("email", email), ("username", username)] {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                scope.context.insert(key.to_string(), Value::from(value));
            }
        }
    }

    pub fn set_session(&self, session_id: impl Into<String>) {
        let mut scope = self.inner.scope.write().unwrap_or_else(PoisonError::into_inner);
        scope
            .context
            .insert("session_id".to_string(), Value::String(session_id.into()));
    }

    pub fn set_tag(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut scope = self.inner.scope.write().unwrap_or_else(PoisonError::into_inner);
        scope.tags.insert(key.into(), value.into());
    }

    pub fn add_breadcrumb(
        &self,
        category: impl Into<String>,
        message: impl Into<String>,
        level: Level,
        data: Option<ValueMap>,
    ) {
        let crumb = Breadcrumb::new(category, message)
            .with_level(level)
            .with_data(data.unwrap_or_default());
        let mut scope = self.inner.scope.write().unwrap_or_else(PoisonError::into_inner);
        scope.breadcrumbs.push(crumb);
    }

    pub fn clear_breadcrumbs(&self) {
        let mut scope = self.inner.scope.write().unwrap_or_else(PoisonError::into_inner);
        scope.breadcrumbs.clear();
    }

    /// Delivers everything queued so far.
    pub async fn flush(&self) -> FlushReport {
        self.inner.transport.flush().await
    }

    /// Stops the transport and drains what is left. Later captures still
    /// return ids but their events are dropped.
    pub async fn close(&self) -> FlushReport {
        let report = self.inner.transport.close().await;
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            info!(
                "CodeWarden client closed ({} delivered, {} dropped on close).",
                report.delivered, report.dropped
            );
        }
        report
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn transport_state(&self) -> TransportState {
        self.inner.transport.state()
    }

    pub fn transport_stats(&self) -> TransportStats {
        self.inner.transport.stats()
    }
}
