// codewarden-core/src/options.rs
//! Client configuration.
//!
//! [`ClientOptions`] can be built in code, deserialized from YAML or JSON,
//! or read from `CODEWARDEN_*` environment variables. Every field except
//! `dsn` has a default.
//!
//! License: MIT OR APACHE 2.0

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::breadcrumbs::DEFAULT_MAX_BREADCRUMBS;
use crate::config::{PatternConfig, PatternRule};
use crate::errors::{WardenError, WardenResult};
use crate::event::Event;
use crate::transport::{Dsn, RetryPolicy, SendMode, TransportConfig};

pub const ENV_DSN: &str = "CODEWARDEN_DSN";
pub const ENV_ENVIRONMENT: &str = "CODEWARDEN_ENVIRONMENT";
pub const ENV_RELEASE: &str = "CODEWARDEN_RELEASE";
pub const ENV_DEBUG: &str = "CODEWARDEN_DEBUG";

/// Runs after scrubbing and before enqueue. Return `None` to drop the event.
pub type BeforeSend = Arc<dyn Fn(Event) -> Option<Event> + Send + Sync>;

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    pub dsn: String,
    pub environment: String,
    pub release: Option<String>,
    pub debug: bool,
    pub enable_pii_scrubbing: bool,
    pub max_queue_size: usize,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub timeout_ms: u64,
    /// Total delivery attempts per batch, including the first.
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub send_mode: SendMode,
    pub max_breadcrumbs: usize,
    /// Custom rules merged over the defaults by name.
    pub patterns: Vec<PatternRule>,
    pub enable_patterns: Vec<String>,
    pub disable_patterns: Vec<String>,
    #[serde(skip)]
    pub before_send: Option<BeforeSend>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            environment: "production".to_string(),
            release: None,
            debug: false,
            enable_pii_scrubbing: true,
            max_queue_size: 100,
            batch_size: 10,
            flush_interval_ms: 5000,
            timeout_ms: 30_000,
            max_retries: 3,
            retry_base_delay_ms: 100,
            send_mode: SendMode::Immediate,
            max_breadcrumbs: DEFAULT_MAX_BREADCRUMBS,
            patterns: Vec::new(),
            enable_patterns: Vec::new(),
            disable_patterns: Vec::new(),
            before_send: None,
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dsn = Dsn::parse(&self.dsn)
            .map(|d| d.to_string())
            .unwrap_or_else(|_| "<invalid>".to_string());
        f.debug_struct("ClientOptions")
            .field("dsn", &dsn)
            .field("environment", &self.environment)
            .field("release", &self.release)
            .field("debug", &self.debug)
            .field("enable_pii_scrubbing", &self.enable_pii_scrubbing)
            .field("max_queue_size", &self.max_queue_size)
            .field("batch_size", &self.batch_size)
            .field("flush_interval_ms", &self.flush_interval_ms)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("send_mode", &self.send_mode)
            .field("max_breadcrumbs", &self.max_breadcrumbs)
            .field("patterns", &self.patterns.len())
            .field("enable_patterns", &self.enable_patterns)
            .field("disable_patterns", &self.disable_patterns)
            .field("before_send", &self.before_send.is_some())
            .finish()
    }
}

impl ClientOptions {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            ..Default::default()
        }
    }

    /// Reads `CODEWARDEN_DSN`, `CODEWARDEN_ENVIRONMENT`, `CODEWARDEN_RELEASE`
    /// and `CODEWARDEN_DEBUG`. Unset variables keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();
        if let Some(dsn) = lookup(ENV_DSN) {
            options.dsn = dsn;
        }
        if let Some(env) = lookup(ENV_ENVIRONMENT).filter(|v| !v.is_empty()) {
            options.environment = env;
        }
        options.release = lookup(ENV_RELEASE).filter(|v| !v.is_empty());
        if let Some(debug) = lookup(ENV_DEBUG) {
            options.debug = matches!(debug.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        options
    }

    /// Loads options from a YAML (or JSON) file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> WardenResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_yml::from_str(&text).map_err(|e| WardenError::Serialization(format!("{}: {}", path.display(), e)))
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_pii_scrubbing(mut self, enabled: bool) -> Self {
        self.enable_pii_scrubbing = enabled;
        self
    }

    pub fn with_send_mode(mut self, mode: SendMode) -> Self {
        self.send_mode = mode;
        self
    }

    pub fn with_pattern(mut self, rule: PatternRule) -> Self {
        self.patterns.push(rule);
        self
    }

    pub fn with_before_send<F>(mut self, hook: F) -> Self
    where
        F: Fn(Event) -> Option<Event> + Send + Sync + 'static,
    {
        self.before_send = Some(Arc::new(hook));
        self
    }

    /// Checks numeric limits and parses the DSN.
    pub fn validate(&self) -> WardenResult<Dsn> {
        if self.max_queue_size == 0 {
            return Err(WardenError::InvalidOption("max_queue_size", "must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(WardenError::InvalidOption("batch_size", "must be at least 1".into()));
        }
        if self.flush_interval_ms == 0 {
            return Err(WardenError::InvalidOption("flush_interval_ms", "must be positive".into()));
        }
        if self.timeout_ms == 0 {
            return Err(WardenError::InvalidOption("timeout_ms", "must be positive".into()));
        }
        Dsn::parse(&self.dsn)
    }

    /// Custom rules as a pattern config, if any were given.
    pub fn custom_patterns(&self) -> Option<PatternConfig> {
        (!self.patterns.is_empty()).then(|| PatternConfig {
            patterns: self.patterns.clone(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            max_queue_size: self.max_queue_size,
            batch_size: self.batch_size,
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            retry: RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_base_delay_ms)),
            send_mode: self.send_mode,
            debug: self.debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let options = ClientOptions::default();
        assert_eq!(options.environment, "production");
        assert!(options.enable_pii_scrubbing);
        assert_eq!(options.max_queue_size, 100);
        assert_eq!(options.batch_size, 10);
        assert_eq!(options.flush_interval_ms, 5000);
        assert_eq!(options.timeout_ms, 30_000);
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.send_mode, SendMode::Immediate);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
dsn: "https://key@ingest.example.com"
send_mode: batched
batch_size: 25
patterns:
  - name: order_id
    pattern: 'ORD-\d{6}'
    mask: '[ORDER]'
"#;
        let options: ClientOptions = serde_yml::from_str(yaml).unwrap();
        assert_eq!(options.send_mode, SendMode::Batched);
        assert_eq!(options.batch_size, 25);
        assert_eq!(options.max_queue_size, 100);
        assert_eq!(options.patterns[0].mask, "[ORDER]");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn env_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_DSN, "https://key@ingest.example.com"),
            (ENV_ENVIRONMENT, "staging"),
            (ENV_DEBUG, "TRUE"),
        ]
        .into_iter()
        .collect();
        let options = ClientOptions::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(options.dsn, "https://key@ingest.example.com");
        assert_eq!(options.environment, "staging");
        assert!(options.debug);
        assert_eq!(options.release, None);
    }

    #[test]
    fn validation_rejects_zero_limits_and_bad_dsn() {
        let mut options = ClientOptions::new("https://key@ingest.example.com");
        options.batch_size = 0;
        assert!(matches!(options.validate(), Err(WardenError::InvalidOption("batch_size", _))));

        let options = ClientOptions::new("not a dsn");
        assert!(matches!(options.validate(), Err(WardenError::InvalidDsn { .. })));
    }

    #[test]
    fn debug_output_hides_api_key() {
        let options = ClientOptions::new("https://secret-key-123@ingest.example.com");
        assert!(!format!("{:?}", options).contains("secret-key-123"));
    }
}
