//! Connection string parsing.
//!
//! A DSN has the form `scheme://API_KEY@host[:port][/path]`. The API key is
//! the URL's username; the delivery base is `scheme://host[:port]`.

use reqwest::Url;
use std::fmt;
use std::str::FromStr;

use crate::errors::{WardenError, WardenResult};

/// Ingestion path appended to the DSN base URL.
pub const TELEMETRY_PATH: &str = "/v1/telemetry";

#[derive(Clone, PartialEq, Eq)]
pub struct Dsn {
    scheme: String,
    api_key: String,
    host: String,
    port: Option<u16>,
}

impl Dsn {
    pub fn parse(raw: &str) -> WardenResult<Self> {
        let invalid = |reason: &str| WardenError::InvalidDsn {
            dsn: redact_raw(raw),
            reason: reason.to_string(),
        };

        let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;

        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(invalid("scheme must be http or https"));
        }

        let api_key = url.username();
        if api_key.is_empty() {
            return Err(invalid("missing API key before '@'"));
        }

        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h,
            _ => return Err(invalid("missing host")),
        };

        Ok(Self {
            scheme: scheme.to_string(),
            api_key: api_key.to_string(),
            host: host.to_string(),
            port: url.port(),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// `scheme://host[:port]`, without credentials or path.
    pub fn base_url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.scheme, self.host, port),
            None => format!("{}://{}", self.scheme, self.host),
        }
    }

    pub fn telemetry_url(&self) -> String {
        format!("{}{}", self.base_url(), TELEMETRY_PATH)
    }
}

impl FromStr for Dsn {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dsn::parse(s)
    }
}

/// Never prints the API key.
impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}://***@{}:{}", self.scheme, self.host, port),
            None => write!(f, "{}://***@{}", self.scheme, self.host),
        }
    }
}

impl fmt::Debug for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dsn")
            .field("scheme", &self.scheme)
            .field("api_key", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

/// Masks whatever sits between `://` and `@` so error messages never echo a key.
fn redact_raw(raw: &str) -> String {
    match (raw.find("://"), raw.rfind('@')) {
        (Some(start), Some(at)) if at > start + 3 => {
            format!("{}***{}", &raw[..start + 3], &raw[at..])
        }
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_host_and_port() {
        let dsn = Dsn::parse("http://cw_live_abc@localhost:8000").unwrap();
        assert_eq!(dsn.api_key(), "cw_live_abc");
        assert_eq!(dsn.host(), "localhost");
        assert_eq!(dsn.port(), Some(8000));
        assert_eq!(dsn.base_url(), "http://localhost:8000");
        assert_eq!(dsn.telemetry_url(), "http://localhost:8000/v1/telemetry");
    }

    #[test]
    fn drops_path_and_default_port() {
        let dsn: Dsn = "https://key@ingest.codewarden.io:443/123".parse().unwrap();
        assert_eq!(dsn.port(), None);
        assert_eq!(dsn.telemetry_url(), "https://ingest.codewarden.io/v1/telemetry");
    }

    #[test]
    fn rejects_malformed_dsns() {
        for raw in ["not a url", "https://ingest.codewarden.io", "ftp://key@host", ""] {
            assert!(
                matches!(Dsn::parse(raw), Err(WardenError::InvalidDsn { .. })),
                "accepted {:?}",
                raw
            );
        }
    }

    #[test]
    fn display_and_errors_hide_the_key() {
        let dsn = Dsn::parse("https://supersecret@ingest.codewarden.io").unwrap();
        assert_eq!(dsn.to_string(), "https://***@ingest.codewarden.io");
        assert!(!format!("{:?}", dsn).contains("supersecret"));

        let err = Dsn::parse("ftp://supersecret@host").unwrap_err().to_string();
        assert!(!err.contains("supersecret"));
    }
}
