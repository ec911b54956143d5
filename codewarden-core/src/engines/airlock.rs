// codewarden-core/src/engines/airlock.rs
//! The Airlock: a `Redactor` backed by the compiled regex pattern registry.
//!
//! Patterns are applied one after another in registration order, each to the
//! output of the previous one. Matches are replaced literally (no `$1`
//! expansion), so masks may contain any characters.
//!
//! License: MIT OR APACHE 2.0

use log::debug;
use regex::NoExpand;
use std::borrow::Cow;
use std::sync::Arc;

use crate::config::{merge_rules, validate_rules, PatternConfig};
use crate::engine::Redactor;
use crate::errors::WardenResult;
use crate::sanitizers::compiler::{get_or_compile_rules, CompiledPatterns};

/// Per-pattern match count from [`Airlock::summarize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrubSummaryItem {
    pub rule_name: String,
    pub mask: String,
    pub occurrences: usize,
}

#[derive(Debug, Clone)]
pub struct Airlock {
    compiled: Arc<CompiledPatterns>,
    config: PatternConfig,
}

impl Airlock {
    /// Compiles `config` once; any bad pattern is returned here.
    pub fn new(config: PatternConfig) -> WardenResult<Self> {
        let compiled = get_or_compile_rules(&config)?;
        debug!("Airlock ready with {} patterns.", compiled.len());
        Ok(Self { compiled, config })
    }

    /// The built-in PII patterns only.
    pub fn with_defaults() -> WardenResult<Self> {
        Self::new(PatternConfig::load_default_rules()?)
    }

    /// Defaults, merged with `custom`, then filtered by the enable/disable
    /// lists.
    pub fn from_parts(
        custom: Option<PatternConfig>,
        enable: &[String],
        disable: &[String],
    ) -> WardenResult<Self> {
        if let Some(custom) = &custom {
            validate_rules(&custom.patterns)?;
        }
        let mut config = merge_rules(PatternConfig::load_default_rules()?, custom);
        config.set_active_rules(enable, disable);
        Self::new(config)
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Counts what `scrub` would replace, rule by rule, without logging or
    /// returning any matched text.
    pub fn summarize(&self, text: &str) -> Vec<ScrubSummaryItem> {
        let mut current = text.to_string();
        let mut summary = Vec::new();
        for pattern in &self.compiled.patterns {
            let occurrences = pattern.regex.find_iter(&current).count();
            if occurrences > 0 {
                current = pattern.regex.replace_all(&current, NoExpand(&pattern.mask)).into_owned();
                summary.push(ScrubSummaryItem {
                    rule_name: pattern.name.clone(),
                    mask: pattern.mask.clone(),
                    occurrences,
                });
            }
        }
        summary
    }
}

impl Redactor for Airlock {
    fn scrub(&self, text: &str) -> String {
        let mut result: Cow<'_, str> = Cow::Borrowed(text);
        for pattern in &self.compiled.patterns {
            let replaced = match pattern.regex.replace_all(&result, NoExpand(&pattern.mask)) {
                Cow::Owned(s) => Some(s),
                Cow::Borrowed(_) => None,
            };
            if let Some(s) = replaced {
                result = Cow::Owned(s);
            }
        }
        result.into_owned()
    }

    fn compiled_patterns(&self) -> &CompiledPatterns {
        &self.compiled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PatternRule;

    fn airlock() -> Airlock {
        Airlock::with_defaults().unwrap()
    }

    #[test]
    fn masks_each_default_category() {
        let a = airlock();
        assert_eq!(a.scrub("contact me at a@b.com"), "contact me at [EMAIL]");
        assert_eq!(a.scrub("call 555-123-4567"), "call [PHONE]");
        assert_eq!(a.scrub("dial +44 20 7946 0958 now"), "dial [PHONE] now");
        assert_eq!(a.scrub("ssn 123-45-6789"), "ssn [SSN]");
        assert_eq!(a.scrub("card 4111 1111 1111 1111"), "card [CARD]");
        assert_eq!(a.scrub("from 192.168.10.1"), "from [IP]");
        assert_eq!(a.scrub("key sk_live1234567890abcdef"), "key [REDACTED]");
        assert_eq!(a.scrub("TOKEN-ABCDEFGHIJKLMNOP1234"), "[REDACTED]");
    }

    #[test]
    fn leaves_clean_text_alone() {
        let a = airlock();
        let text = "user clicked the submit button twice";
        assert_eq!(a.scrub(text), text);
    }

    #[test]
    fn scrub_is_idempotent() {
        let a = airlock();
        let inputs = [
            "mail a@b.com or call 555-123-4567 from 10.0.0.1",
            "ssn 123-45-6789 card 4111-1111-1111-1111 secret_abcdefghijklmnop",
            "nothing to see",
        ];
        for input in inputs {
            let once = a.scrub(input);
            assert_eq!(a.scrub(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn custom_rules_and_disable_list() {
        let custom = PatternConfig {
            patterns: vec![PatternRule::new("order_id", r"ORD-\d{6}", "[ORDER]")],
        };
        let a = Airlock::from_parts(Some(custom), &[], &["email".to_string()]).unwrap();
        assert_eq!(a.scrub("ORD-123456 for a@b.com"), "[ORDER] for a@b.com");
    }

    #[test]
    fn masks_are_literal() {
        let config = PatternConfig {
            patterns: vec![PatternRule::new("dollar", r"(\d+)", "$1-kept")],
        };
        let a = Airlock::new(config).unwrap();
        assert_eq!(a.scrub("42"), "$1-kept");
    }

    #[test]
    fn summarize_counts_per_rule() {
        let a = airlock();
        let summary = a.summarize("a@b.com c@d.org 10.0.0.1");
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].rule_name, "email");
        assert_eq!(summary[0].occurrences, 2);
        assert_eq!(summary[1].mask, "[IP]");
    }
}
