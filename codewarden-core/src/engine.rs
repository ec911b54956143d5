// codewarden-core/src/engine.rs
//! Defines the core `Redactor` trait.
//!
//! A redactor only has to know how to scrub one string. Walking nested JSON
//! values and events is the same for every implementation and lives in the
//! provided methods, so the set of fields that are (and are not) scrubbed is
//! fixed in one place.
//!
//! License: MIT OR APACHE 2.0

use serde_json::Value;

use crate::config::DEFAULT_MASK;
use crate::event::{Event, ValueMap};
use crate::sanitizers::compiler::CompiledPatterns;

/// Nesting depth past which a JSON subtree is replaced wholesale by the
/// default mask instead of being walked.
///
/// Owned `serde_json::Value` trees cannot be cyclic, so the limit only guards
/// the stack against adversarially deep input.
pub const MAX_SCRUB_DEPTH: usize = 64;

/// A pluggable PII redactor.
pub trait Redactor: Send + Sync {
    /// Replaces every match of every enabled pattern with its mask.
    fn scrub(&self, text: &str) -> String;

    /// The compiled rules this redactor applies, in application order.
    fn compiled_patterns(&self) -> &CompiledPatterns;

    /// Scrubs every string leaf of a JSON value, keeping its shape.
    fn scrub_structure(&self, value: Value) -> Value {
        scrub_value(self, value, 0)
    }

    /// Scrubs every value of a string-keyed map. Keys are left untouched.
    fn scrub_map(&self, map: ValueMap) -> ValueMap {
        scrub_map_at(self, map, 0)
    }

    /// Returns a copy of `event` with its free-text fields scrubbed.
    ///
    /// Scrubbed: `message`, `exception.value`, frame `context_line`,
    /// `context`, `extra`, breadcrumb messages and data.
    /// Never scrubbed: `event_id`, `timestamp`, `level`, `tags`,
    /// `exception.type`, frame filenames and function names.
    fn scrub_event(&self, mut event: Event) -> Event {
        event.message = event.message.map(|m| self.scrub(&m));

        if let Some(exception) = event.exception.as_mut() {
            exception.value = self.scrub(&exception.value);
            for frame in exception.stacktrace.iter_mut() {
                frame.context_line = frame.context_line.take().map(|line| self.scrub(&line));
            }
        }

        event.context = self.scrub_map(std::mem::take(&mut event.context));
        event.extra = self.scrub_map(std::mem::take(&mut event.extra));

        for crumb in event.breadcrumbs.iter_mut() {
            crumb.message = self.scrub(&crumb.message);
            crumb.data = self.scrub_map(std::mem::take(&mut crumb.data));
        }

        event
    }
}

fn scrub_value<R: Redactor + ?Sized>(redactor: &R, value: Value, depth: usize) -> Value {
    if depth >= MAX_SCRUB_DEPTH {
        return Value::String(DEFAULT_MASK.to_string());
    }
    match value {
        Value::String(s) => Value::String(redactor.scrub(&s)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| scrub_value(redactor, item, depth + 1))
                .collect(),
        ),
        Value::Object(map) => Value::Object(scrub_map_at(redactor, map, depth + 1)),
        other => other,
    }
}

fn scrub_map_at<R: Redactor + ?Sized>(redactor: &R, map: ValueMap, depth: usize) -> ValueMap {
    map.into_iter()
        .map(|(key, value)| (key, scrub_value(redactor, value, depth)))
        .collect()
}
