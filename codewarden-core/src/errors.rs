//! errors.rs - Custom error types for the codewarden-core library.
//!
//! Every error in this module is a configuration or lifecycle error: it is
//! returned synchronously from construction and never from a capture call.
//! Delivery failures are classified separately by
//! [`DeliveryError`](crate::transport::DeliveryError) and stay inside the
//! transport.
//!
//! License: MIT OR APACHE 2.0

use thiserror::Error;

/// All errors surfaced to callers of `codewarden-core`.
///
/// `#[non_exhaustive]` so new variants can be added without breaking
/// downstream matches.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WardenError {
    #[error("Invalid DSN '{dsn}': {reason}")]
    InvalidDsn { dsn: String, reason: String },

    #[error("Failed to compile pattern '{0}': {1}")]
    PatternCompilation(String, regex::Error),

    #[error("Pattern '{0}': pattern length ({1}) exceeds maximum allowed ({2})")]
    PatternLengthExceeded(String, usize, usize),

    #[error("Invalid pattern configuration: {0}")]
    InvalidPatternConfig(String),

    #[error("Invalid client option '{0}': {1}")]
    InvalidOption(&'static str, String),

    #[error("No tokio runtime is available to run the transport worker")]
    NoRuntime,

    #[error("CodeWarden SDK not initialized. Call codewarden_core::global::init() first.")]
    NotInitialized,

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Failed to parse configuration: {0}")]
    Serialization(String),

    #[error("An unexpected I/O error occurred: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type WardenResult<T> = Result<T, WardenError>;
