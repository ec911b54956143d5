// codewarden-core/src/integrations.rs
//! Framework-neutral hooks for web servers and the process panic handler.
//!
//! The core never depends on a web framework. A framework adapter calls
//! [`RequestIntegration::on_request_start`] when a request arrives,
//! [`RequestIntegration::on_exception`] if handling fails, and
//! [`RequestIntegration::on_request_end`] when the response is sent.
//! [`RequestTracker`] is the stock implementation on top of a [`Client`].
//!
//! License: MIT OR APACHE 2.0

use log::debug;
use serde_json::{json, Value};
use std::any::Any;
use std::error::Error as StdError;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::builder::CaptureRequest;
use crate::client::{capture_in_progress, Client};
use crate::event::{ExceptionInfo, Level, StackFrame, ValueMap};

pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024;
const TRUNCATION_MARKER: &str = "... [truncated]";

/// Header names never copied into request context.
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
];

/// What an adapter knows about an incoming request.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
    pub query_string: Option<String>,
    pub headers: Vec<(String, String)>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub body: Option<Vec<u8>>,
}

impl RequestInfo {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Measures a request's wall-clock duration.
#[derive(Debug, Clone, Copy)]
pub struct RequestTimer {
    start: Instant,
    end: Option<Instant>,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            end: None,
        }
    }

    /// Freezes the timer. Later calls keep the first end time.
    pub fn stop(&mut self) -> Duration {
        let end = *self.end.get_or_insert_with(Instant::now);
        end.duration_since(self.start)
    }

    pub fn elapsed(&self) -> Duration {
        self.end.unwrap_or_else(Instant::now).duration_since(self.start)
    }

    pub fn duration_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }
}

/// Per-request state handed back to the adapter by `on_request_start`.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    pub request_id: String,
    pub context: ValueMap,
    pub timer: RequestTimer,
}

pub trait RequestIntegration: Send + Sync {
    /// Returns `None` for requests that should not be tracked.
    fn on_request_start(&self, request: &RequestInfo) -> Option<RequestHandle>;

    /// Records the response. Returns the request duration.
    fn on_request_end(&self, handle: RequestHandle, status: u16) -> Duration;

    /// Captures a failure raised while handling the request. Returns the
    /// event id, or `None` when exception capture is turned off.
    fn on_exception(&self, handle: &RequestHandle, err: &(dyn StdError + 'static)) -> Option<String>;
}

/// Request tracking for a [`Client`]: breadcrumbs per request, request
/// context on captured errors.
#[derive(Debug, Clone)]
pub struct RequestTracker {
    client: Client,
    excluded_paths: Vec<String>,
    capture_exceptions: bool,
    capture_request_body: bool,
    max_body_size: usize,
}

impl RequestTracker {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            excluded_paths: Vec::new(),
            capture_exceptions: true,
            capture_request_body: false,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Paths starting with any of these prefixes are not tracked.
    pub fn exclude_paths<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_paths.extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn capture_exceptions(mut self, enabled: bool) -> Self {
        self.capture_exceptions = enabled;
        self
    }

    pub fn capture_request_body(mut self, enabled: bool) -> Self {
        self.capture_request_body = enabled;
        self
    }

    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    pub fn should_track(&self, path: &str) -> bool {
        !self.excluded_paths.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn generate_request_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Context attached to events captured during the request. The request
    /// id doubles as the envelope's trace id.
    pub fn build_request_context(&self, request_id: &str, request: &RequestInfo) -> ValueMap {
        let mut context = ValueMap::new();
        context.insert("request_id".into(), json!(request_id));
        context.insert("trace_id".into(), json!(request_id));
        context.insert("method".into(), json!(request.method));
        context.insert("url".into(), json!(request.path));
        if let Some(query) = request.query_string.as_deref().filter(|q| !q.is_empty()) {
            context.insert("query_string".into(), json!(query));
        }
        if let Some(ip) = &request.client_ip {
            context.insert("ip_address".into(), json!(ip));
        }
        if let Some(agent) = &request.user_agent {
            context.insert("user_agent".into(), json!(agent));
        }

        let headers: ValueMap = request
            .headers
            .iter()
            .filter(|(name, _)| !SENSITIVE_HEADERS.contains(&name.to_ascii_lowercase().as_str()))
            .map(|(name, value)| (name.to_ascii_lowercase(), Value::String(value.clone())))
            .collect();
        if !headers.is_empty() {
            context.insert("headers".into(), Value::Object(headers));
        }

        if self.capture_request_body {
            if let Some(body) = &request.body {
                context.insert("request_body".into(), json!(self.truncate_body(body)));
            }
        }
        context
    }

    /// Like [`RequestIntegration::on_exception`], keeping the concrete
    /// type name of `err` instead of the trait object's.
    pub fn capture_error<E: StdError + ?Sized>(&self, handle: &RequestHandle, err: &E) -> Option<String> {
        if !self.capture_exceptions {
            return None;
        }
        let mut request = CaptureRequest::from_error(err);
        request.context.extend(handle.context.clone());
        Some(self.client.capture_event(request))
    }

    /// Lossy UTF-8 decode, cut to at most `max_body_size` bytes on a char
    /// boundary.
    pub fn truncate_body(&self, body: &[u8]) -> String {
        let text = String::from_utf8_lossy(body);
        if text.len() <= self.max_body_size {
            return text.into_owned();
        }
        let mut cut = self.max_body_size;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}{}", &text[..cut], TRUNCATION_MARKER)
    }
}

impl RequestIntegration for RequestTracker {
    fn on_request_start(&self, request: &RequestInfo) -> Option<RequestHandle> {
        if !self.should_track(&request.path) {
            return None;
        }
        let request_id = self.generate_request_id();
        let context = self.build_request_context(&request_id, request);
        self.client.add_breadcrumb(
            "http",
            format!("{} {}", request.method, request.path),
            Level::Info,
            None,
        );
        Some(RequestHandle {
            request_id,
            context,
            timer: RequestTimer::start(),
        })
    }

    fn on_request_end(&self, mut handle: RequestHandle, status: u16) -> Duration {
        let duration = handle.timer.stop();
        let level = if status >= 500 {
            Level::Error
        } else if status >= 400 {
            Level::Warning
        } else {
            Level::Info
        };
        let mut data = ValueMap::new();
        data.insert("status_code".into(), json!(status));
        data.insert("duration_ms".into(), json!(duration.as_secs_f64() * 1000.0));
        data.insert("request_id".into(), json!(handle.request_id));
        self.client
            .add_breadcrumb("http.response", format!("HTTP {}", status), level, Some(data));
        debug!("Request {} finished with {} in {:?}.", handle.request_id, status, duration);
        duration
    }

    fn on_exception(&self, handle: &RequestHandle, err: &(dyn StdError + 'static)) -> Option<String> {
        self.capture_error(handle, err)
    }
}

/// Captures panics as `error` events, then runs the previously installed
/// hook. The event is only queued; call [`Client::flush`] or
/// [`Client::close`] before the process exits to deliver it.
///
/// Panics raised while a capture is already running on the same thread
/// (a panicking `before_send`, for one) are passed straight to the
/// previous hook and left to the capture's own unwind handling. The panic
/// event itself still goes through `before_send`, and Rust aborts on a
/// panic raised inside a panic hook, so that hook must not panic on it.
pub fn install_panic_hook(client: Client) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if capture_in_progress() {
            previous(info);
            return;
        }
        let message = panic_message(info.payload());
        let mut exception = ExceptionInfo {
            ty: "Panic".to_string(),
            value: message.clone(),
            ..Default::default()
        };
        if let Some(location) = info.location() {
            exception.stacktrace.push(StackFrame {
                filename: location.file().to_string(),
                line: Some(location.line()),
                column: Some(location.column()),
                function: std::thread::current().name().unwrap_or("<unnamed>").to_string(),
                context_line: None,
            });
        }

        let mut request = CaptureRequest::message(message, Level::Error).with_tag("mechanism", "panic");
        request.exception = Some(exception);
        client.capture_event(request);

        previous(info);
    }));
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}
