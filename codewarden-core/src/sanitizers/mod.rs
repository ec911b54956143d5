//! Rule compilation for the Airlock.
//!
//! Turns a [`PatternConfig`](crate::config::PatternConfig) into compiled
//! regular expressions, failing fast on the first bad pattern set and caching
//! compiled sets process-wide.

pub mod compiler;
