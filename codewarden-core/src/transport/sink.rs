// File: codewarden-core/src/transport/sink.rs
//! Delivery seam.
//!
//! [`EventSink`] is the one place the transport touches the network. The
//! production implementation is [`HttpSink`]; tests plug in their own.

use async_trait::async_trait;
use log::debug;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

use crate::builder::{SDK_NAME, SDK_VERSION};
use crate::errors::WardenResult;
use crate::transport::dsn::Dsn;
use crate::transport::envelope::WireBody;

/// Why a delivery attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// 4xx: payload or credentials are invalid; retrying cannot help.
    #[error("endpoint rejected the request with HTTP {status}")]
    Permanent { status: u16 },

    /// 5xx, timeout or connection failure.
    #[error("transient delivery failure: {reason}")]
    Transient { reason: String },

    /// The request could not be built locally.
    #[error("failed to encode request: {0}")]
    Encoding(String),
}

impl DeliveryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Transient { .. })
    }
}

/// Maps an HTTP status to a delivery result.
pub fn classify_status(status: StatusCode) -> Result<(), DeliveryError> {
    if status.is_success() {
        Ok(())
    } else if status.is_server_error() {
        Err(DeliveryError::Transient {
            reason: format!("HTTP {}", status.as_u16()),
        })
    } else {
        Err(DeliveryError::Permanent {
            status: status.as_u16(),
        })
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;

    /// One delivery attempt. Retrying is the caller's job.
    async fn deliver(&self, body: &WireBody) -> Result<(), DeliveryError>;
}

/// POSTs envelopes to `{base}/v1/telemetry` with a bearer API key.
pub struct HttpSink {
    client: Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpSink {
    pub fn new(dsn: &Dsn, timeout: Duration) -> WardenResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("{}/{}", SDK_NAME, SDK_VERSION))
            .build()?;

        Ok(Self {
            client,
            url: dsn.telemetry_url(),
            api_key: dsn.api_key().to_string(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventSink for HttpSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn deliver(&self, body: &WireBody) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() || e.is_body() {
                    DeliveryError::Encoding(e.to_string())
                } else if e.is_timeout() {
                    DeliveryError::Transient {
                        reason: format!("timed out after {:?}", self.timeout),
                    }
                } else {
                    DeliveryError::Transient { reason: e.to_string() }
                }
            })?;

        debug!("POST {} -> {}", self.url, resp.status());
        classify_status(resp.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes() {
        assert!(classify_status(StatusCode::OK).is_ok());
        assert!(classify_status(StatusCode::ACCEPTED).is_ok());
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST),
            Err(DeliveryError::Permanent { status: 400 })
        );
        assert!(classify_status(StatusCode::UNAUTHORIZED).is_err_and(|e| !e.is_retryable()));
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE).is_err_and(|e| e.is_retryable()));
    }
}
