//! The typed event model shared by the builder, the Airlock and the transport.
//!
//! License: MIT OR APACHE 2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::breadcrumbs::Breadcrumb;

/// Open string-keyed map used for `context` and `extra`.
pub type ValueMap = Map<String, Value>;

/// Severity of a captured event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warning,
    #[default]
    Info,
    Debug,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Level::Error),
            "warning" | "warn" => Ok(Level::Warning),
            "info" => Ok(Level::Info),
            "debug" => Ok(Level::Debug),
            other => Err(format!("unknown level '{}'", other)),
        }
    }
}

/// One frame of a parsed stack trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StackFrame {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_line: Option<String>,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {} ({}", self.function, self.filename)?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
            if let Some(column) = self.column {
                write!(f, ":{}", column)?;
            }
        }
        f.write_str(")")
    }
}

fn innermost_first_default() -> bool {
    true
}

/// Structured description of a captured error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    #[serde(rename = "type")]
    pub ty: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Frames in the order the platform printed them.
    #[serde(default)]
    pub stacktrace: Vec<StackFrame>,
    /// Rust and V8 print the innermost frame first, Python prints it last.
    #[serde(default = "innermost_first_default")]
    pub innermost_first: bool,
}

impl Default for ExceptionInfo {
    fn default() -> Self {
        Self {
            ty: String::new(),
            value: String::new(),
            module: None,
            stacktrace: Vec::new(),
            innermost_first: true,
        }
    }
}

impl ExceptionInfo {
    /// The frame closest to where the error was raised, if any.
    pub fn innermost_frame(&self) -> Option<&StackFrame> {
        if self.innermost_first {
            self.stacktrace.first()
        } else {
            self.stacktrace.last()
        }
    }

    /// Renders the stack trace as plain text, one frame per line.
    pub fn render_stacktrace(&self) -> Option<String> {
        if self.stacktrace.is_empty() {
            return None;
        }
        let lines: Vec<String> = self.stacktrace.iter().map(|f| format!("  {}", f)).collect();
        Some(format!("{}: {}\n{}", self.ty, self.value, lines.join("\n")))
    }
}

/// The unit of telemetry.
///
/// Once handed to [`Transport::send`](crate::transport::Transport::send) the
/// event is moved into the queue and can no longer be touched by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
    #[serde(default)]
    pub context: ValueMap,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub extra: ValueMap,
    #[serde(default)]
    pub breadcrumbs: Vec<Breadcrumb>,
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
}

impl Event {
    /// A fresh event with a random v4 id and the current time.
    pub fn new(level: Level, environment: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            level,
            message: None,
            exception: None,
            context: ValueMap::new(),
            tags: BTreeMap::new(),
            extra: ValueMap::new(),
            breadcrumbs: Vec::new(),
            environment: environment.into(),
            release: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parses_case_insensitively() {
        assert_eq!("ERROR".parse::<Level>().unwrap(), Level::Error);
        assert_eq!("warn".parse::<Level>().unwrap(), Level::Warning);
        assert!("fatal".parse::<Level>().is_err());
    }

    #[test]
    fn exception_serializes_type_field() {
        let info = ExceptionInfo {
            ty: "IoError".into(),
            value: "boom".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["type"], "IoError");
        assert!(json.get("module").is_none());
    }

    #[test]
    fn render_stacktrace_lists_frames() {
        let info = ExceptionInfo {
            ty: "Panic".into(),
            value: "boom".into(),
            module: None,
            innermost_first: true,
            stacktrace: vec![StackFrame {
                filename: "src/main.rs".into(),
                line: Some(10),
                column: Some(5),
                function: "app::run".into(),
                context_line: None,
            }],
        };
        assert_eq!(
            info.render_stacktrace().unwrap(),
            "Panic: boom\n  at app::run (src/main.rs:10:5)"
        );
    }
}
