//! Event construction.
//!
//! Turns a [`CaptureRequest`] (a message, or an error) plus the client's
//! ambient [`Scope`] into a fresh [`Event`]. Per-call context and tags win
//! over the ambient ones on key collision.
//!
//! Stack traces are parsed from text, so frames can come from a Rust
//! `std::backtrace::Backtrace`, or be forwarded from a V8 or Python process.
//!
//! License: MIT OR APACHE 2.0

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use uuid::Uuid;

use crate::breadcrumbs::BreadcrumbBuffer;
use crate::event::{Event, ExceptionInfo, Level, StackFrame, ValueMap};

pub const SDK_NAME: &str = "codewarden-rust";
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

const UNKNOWN_FILE: &str = "<unknown>";

static RUST_SYMBOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+):\s+(\S.*?)\s*$").expect("static regex"));
static RUST_LOCATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*at\s+(.+?):(\d+)(?::(\d+))?\s*$").expect("static regex"));
static JS_FRAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*at\s+(.+?)\s+\((.+?):(\d+):(\d+)\)\s*$").expect("static regex"));
static JS_ANONYMOUS_FRAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*at\s+(.+?):(\d+):(\d+)\s*$").expect("static regex"));
static PYTHON_FRAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*File "(.+?)", line (\d+)(?:, in (.+?))?\s*$"#).expect("static regex"));

/// Ambient state attached to every event a client captures.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// user id, session id and any custom keys set through the client.
    pub context: ValueMap,
    pub tags: BTreeMap<String, String>,
    pub breadcrumbs: BreadcrumbBuffer,
}

impl Scope {
    pub fn with_max_breadcrumbs(max: usize) -> Self {
        Self {
            breadcrumbs: BreadcrumbBuffer::new(max),
            ..Default::default()
        }
    }
}

/// Everything a single capture call contributes to an event.
#[derive(Debug, Clone, Default)]
pub struct CaptureRequest {
    pub level: Level,
    pub message: Option<String>,
    pub exception: Option<ExceptionInfo>,
    pub context: ValueMap,
    pub tags: BTreeMap<String, String>,
    pub extra: ValueMap,
}

impl CaptureRequest {
    pub fn message(message: impl Into<String>, level: Level) -> Self {
        Self {
            level,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// An `error`-level request for `err`, with its `source()` chain in
    /// `extra.error_chain` and a backtrace captured here if
    /// `RUST_BACKTRACE` enables it.
    pub fn from_error<E: StdError + ?Sized>(err: &E) -> Self {
        let mut exception = ExceptionInfo::from_error(err);
        let backtrace = Backtrace::capture();
        if backtrace.status() == BacktraceStatus::Captured {
            exception.stacktrace = strip_sdk_frames(parse_stacktrace(&backtrace.to_string()));
        }

        let mut extra = ValueMap::new();
        let chain = error_chain(err);
        if !chain.is_empty() {
            extra.insert("error_chain".to_string(), json!(chain));
        }

        Self {
            level: Level::Error,
            message: Some(err.to_string()),
            exception: Some(exception),
            extra,
            ..Default::default()
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Replaces the exception's frames with those parsed from `raw`.
    /// Creates an exception record from the message if there is none.
    pub fn with_stacktrace(mut self, raw: &str) -> Self {
        let frames = parse_stacktrace(raw);
        let exception = self.exception.get_or_insert_with(|| ExceptionInfo {
            ty: "Error".to_string(),
            value: self.message.clone().unwrap_or_default(),
            ..Default::default()
        });
        exception.stacktrace = frames;
        exception.innermost_first = is_innermost_first(raw);
        self
    }
}

impl ExceptionInfo {
    /// Type and message of `err`; the stack trace is left empty.
    pub fn from_error<E: StdError + ?Sized>(err: &E) -> Self {
        let (ty, module) = split_type_name(std::any::type_name::<E>());
        Self {
            ty,
            value: err.to_string(),
            module,
            stacktrace: Vec::new(),
            innermost_first: true,
        }
    }
}

/// Builds events for one client. Holds the per-client constants.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    environment: String,
    release: Option<String>,
    runtime: Value,
}

impl EventBuilder {
    pub fn new(environment: impl Into<String>, release: Option<String>) -> Self {
        Self {
            environment: environment.into(),
            release,
            runtime: runtime_info(),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn release(&self) -> Option<&str> {
        self.release.as_deref()
    }

    /// Creates a new event with a fresh id and timestamp.
    pub fn build(&self, scope: &Scope, request: CaptureRequest) -> Event {
        let mut context = scope.context.clone();
        context.extend(request.context);
        context.entry("runtime").or_insert_with(|| self.runtime.clone());

        let mut tags = scope.tags.clone();
        tags.extend(request.tags);

        Event {
            event_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            level: request.level,
            message: request.message,
            exception: request.exception,
            context,
            tags,
            extra: request.extra,
            breadcrumbs: scope.breadcrumbs.snapshot(),
            environment: self.environment.clone(),
            release: self.release.clone(),
        }
    }
}

/// OS, architecture and SDK identity, captured once per client.
pub fn runtime_info() -> Value {
    json!({
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "family": std::env::consts::FAMILY,
        "sdk": { "name": SDK_NAME, "version": SDK_VERSION },
    })
}

/// Parses a textual stack trace into frames, keeping the input order.
///
/// Recognised: Rust `std::backtrace` output, V8 `at fn (file:line:col)`
/// lines and Python `File "f", line N, in fn` lines (with the following
/// indented source line as `context_line`). Anything else is skipped.
pub fn parse_stacktrace(raw: &str) -> Vec<StackFrame> {
    enum Pending {
        Nothing,
        RustSymbol(usize),
        PythonFrame(usize),
    }

    let mut frames: Vec<StackFrame> = Vec::new();
    let mut pending = Pending::Nothing;
    let mut rust_trace = false;

    for line in raw.lines() {
        if let Pending::RustSymbol(idx) = pending {
            if let Some(caps) = RUST_LOCATION.captures(line) {
                let frame = &mut frames[idx];
                frame.filename = caps[1].to_string();
                frame.line = caps[2].parse().ok();
                frame.column = caps.get(3).and_then(|m| m.as_str().parse().ok());
                pending = Pending::Nothing;
                continue;
            }
        }

        if let Pending::PythonFrame(idx) = pending {
            pending = Pending::Nothing;
            let is_source_line = line.starts_with(char::is_whitespace)
                && !line.trim().is_empty()
                && !PYTHON_FRAME.is_match(line);
            if is_source_line {
                frames[idx].context_line = Some(line.trim().to_string());
                continue;
            }
        }

        if let Some(caps) = PYTHON_FRAME.captures(line) {
            frames.push(StackFrame {
                filename: caps[1].to_string(),
                line: caps[2].parse().ok(),
                column: None,
                function: caps.get(3).map_or("<module>", |m| m.as_str()).to_string(),
                context_line: None,
            });
            pending = Pending::PythonFrame(frames.len() - 1);
        } else if let Some(caps) = JS_FRAME.captures(line) {
            frames.push(StackFrame {
                filename: caps[2].to_string(),
                line: caps[3].parse().ok(),
                column: caps[4].parse().ok(),
                function: caps[1].to_string(),
                context_line: None,
            });
            pending = Pending::Nothing;
        } else if rust_trace && RUST_LOCATION.is_match(line) {
            // Location with no symbol in front of it.
            pending = Pending::Nothing;
        } else if let Some(caps) = JS_ANONYMOUS_FRAME.captures(line) {
            frames.push(StackFrame {
                filename: caps[1].to_string(),
                line: caps[2].parse().ok(),
                column: caps[3].parse().ok(),
                function: "<anonymous>".to_string(),
                context_line: None,
            });
            pending = Pending::Nothing;
        } else if let Some(caps) = RUST_SYMBOL.captures(line) {
            frames.push(StackFrame {
                filename: UNKNOWN_FILE.to_string(),
                line: None,
                column: None,
                function: caps[2].to_string(),
                context_line: None,
            });
            pending = Pending::RustSymbol(frames.len() - 1);
            rust_trace = true;
        } else if rust_trace && is_inlined_symbol(line) {
            frames.push(StackFrame {
                filename: UNKNOWN_FILE.to_string(),
                line: None,
                column: None,
                function: line.trim().to_string(),
                context_line: None,
            });
            pending = Pending::RustSymbol(frames.len() - 1);
        } else {
            pending = Pending::Nothing;
        }
    }

    frames
}

/// `std::backtrace` prints inlined functions as an indented symbol with no
/// frame index, followed by their own `at` line.
fn is_inlined_symbol(line: &str) -> bool {
    let symbol = line.trim();
    line.starts_with(char::is_whitespace) && !symbol.is_empty() && !symbol.starts_with("at ")
}

/// Python prints the most recent call last; Rust and V8 print it first.
pub fn is_innermost_first(raw: &str) -> bool {
    !raw.lines().any(|l| PYTHON_FRAME.is_match(l))
}

/// Drops the backtrace machinery and SDK frames at the top of a trace
/// captured inside the SDK.
fn strip_sdk_frames(frames: Vec<StackFrame>) -> Vec<StackFrame> {
    frames
        .into_iter()
        .skip_while(|f| {
            f.function.contains("backtrace")
                || f.function.starts_with("codewarden_core::")
                || f.function.starts_with("<codewarden_core::")
        })
        .collect()
}

fn error_chain<E: StdError + ?Sized>(err: &E) -> Vec<String> {
    let mut chain = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain
}

/// `"std::io::error::Error"` → `("Error", Some("std::io::error"))`.
/// Trait objects only name their trait: `"dyn core::error::Error + Send"`
/// → `("Error", None)`.
fn split_type_name(full: &str) -> (String, Option<String>) {
    if let Some(object) = full.strip_prefix("dyn ") {
        let path = object.split(' ').next().unwrap_or(object);
        let name = path.rsplit("::").next().unwrap_or(path);
        return (name.to_string(), None);
    }
    let path = full.split('<').next().unwrap_or(full);
    match path.rsplit_once("::") {
        Some((module, name)) => (name.to_string(), Some(module.to_string())),
        None => (path.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("boom")
        }
    }

    impl StdError for Boom {}

    #[derive(Debug)]
    struct Wrapper(Boom);

    impl std::fmt::Display for Wrapper {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("request failed")
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn parses_rust_backtrace() {
        let raw = "   0: app::handler::run\n             at ./src/handler.rs:42:9\n   1: app::main\n             at ./src/main.rs:7:5\n   2: core::ops::function::FnOnce::call_once\nnote: Some details are omitted";
        let frames = parse_stacktrace(raw);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].function, "app::handler::run");
        assert_eq!(frames[0].filename, "./src/handler.rs");
        assert_eq!(frames[0].line, Some(42));
        assert_eq!(frames[0].column, Some(9));
        assert_eq!(frames[2].filename, UNKNOWN_FILE);
        assert!(is_innermost_first(raw));
    }

    #[test]
    fn inlined_rust_frames_keep_their_symbol() {
        let raw = "   0: app::outer\n             at ./src/a.rs:1:1\n      app::inlined\n             at ./src/b.rs:2:2\n   1: app::main\n             at ./src/main.rs:3:3";
        let frames = parse_stacktrace(raw);
        let functions: Vec<&str> = frames.iter().map(|f| f.function.as_str()).collect();
        assert_eq!(functions, ["app::outer", "app::inlined", "app::main"]);
        assert_eq!(frames[1].filename, "./src/b.rs");
        assert_eq!(frames[1].line, Some(2));
        assert_eq!(frames[1].column, Some(2));
        assert!(frames.iter().all(|f| f.function != "<anonymous>"));
    }

    #[test]
    fn parses_v8_trace() {
        let raw = "Error: boom\n    at doWork (/app/src/index.js:10:15)\n    at /app/src/index.js:20:3\n    garbage line";
        let frames = parse_stacktrace(raw);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].function, "doWork");
        assert_eq!(frames[0].column, Some(15));
        assert_eq!(frames[1].function, "<anonymous>");
        assert_eq!(frames[1].line, Some(20));
    }

    #[test]
    fn parses_python_traceback_with_source_lines() {
        let raw = "Traceback (most recent call last):\n  File \"app.py\", line 3, in main\n    handler()\n  File \"lib.py\", line 9, in handler\n    raise ValueError(\"boom\")\nValueError: boom";
        let frames = parse_stacktrace(raw);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].function, "main");
        assert_eq!(frames[0].context_line.as_deref(), Some("handler()"));
        assert_eq!(frames[1].filename, "lib.py");
        assert!(!is_innermost_first(raw));
    }

    #[test]
    fn empty_or_garbage_stack_yields_no_frames() {
        assert!(parse_stacktrace("").is_empty());
        assert!(parse_stacktrace("not a stack\nat all").is_empty());
    }

    #[test]
    fn from_error_records_type_and_chain() {
        let request = CaptureRequest::from_error(&Wrapper(Boom));
        assert_eq!(request.level, Level::Error);
        let exception = request.exception.unwrap();
        assert_eq!(exception.ty, "Wrapper");
        assert_eq!(exception.value, "request failed");
        assert_eq!(request.extra["error_chain"], json!(["boom"]));
    }

    #[test]
    fn trait_object_errors_have_no_module() {
        let err: Box<dyn StdError> = Box::new(Wrapper(Boom));
        let exception = ExceptionInfo::from_error(err.as_ref());
        assert_eq!(exception.ty, "Error");
        assert_eq!(exception.module, None);
        assert_eq!(exception.value, "request failed");
    }

    #[test]
    fn per_call_context_wins() {
        let mut scope = Scope::default();
        scope.context.insert("user_id".into(), json!("u-1"));
        scope.context.insert("session_id".into(), json!("s-1"));
        scope.tags.insert("region".into(), "eu".into());

        let builder = EventBuilder::new("staging", Some("1.2.3".into()));
        let request = CaptureRequest::message("hello", Level::Info)
            .with_context("user_id", "u-2")
            .with_tag("region", "us");
        let event = builder.build(&scope, request);

        assert_eq!(event.context["user_id"], json!("u-2"));
        assert_eq!(event.context["session_id"], json!("s-1"));
        assert_eq!(event.tags["region"], "us");
        assert_eq!(event.environment, "staging");
        assert_eq!(event.release.as_deref(), Some("1.2.3"));
        assert!(event.context["runtime"]["sdk"]["name"] == SDK_NAME);
        assert!(Uuid::parse_str(&event.event_id).is_ok());
    }

    #[test]
    fn with_stacktrace_creates_exception() {
        let request = CaptureRequest::message("boom", Level::Error)
            .with_stacktrace("    at run (/srv/app.js:1:2)");
        let exception = request.exception.unwrap();
        assert_eq!(exception.value, "boom");
        assert_eq!(exception.stacktrace.len(), 1);
    }

    #[test]
    fn split_type_name_handles_generics() {
        assert_eq!(
            split_type_name("std::io::error::Error"),
            ("Error".to_string(), Some("std::io::error".to_string()))
        );
        assert_eq!(
            split_type_name("app::Wrapper<alloc::string::String>"),
            ("Wrapper".to_string(), Some("app".to_string()))
        );
        assert_eq!(split_type_name("Boom"), ("Boom".to_string(), None));
        assert_eq!(
            split_type_name("dyn core::error::Error + core::marker::Send"),
            ("Error".to_string(), None)
        );
    }
}
