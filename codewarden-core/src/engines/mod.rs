// codewarden-core/src/engines/mod.rs
//! Concrete `Redactor` implementations.
//!
//! Each engine lives in its own file and implements
//! [`Redactor`](crate::engine::Redactor). The Airlock is the regex-backed
//! engine every client uses.
//!
//! License: MIT OR APACHE 2.0

pub mod airlock;
