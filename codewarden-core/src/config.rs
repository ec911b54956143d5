//! Pattern configuration for the CodeWarden Airlock.
//!
//! This module defines the data structures for PII pattern rules and handles
//! loading them from the embedded defaults or from user YAML files, merging
//! user rules over the defaults, and filtering by enable/disable lists.
//!
//! Registration order matters: the Airlock applies rules in the order they
//! appear in [`PatternConfig::patterns`], so every operation here preserves it.
//!
//! License: MIT OR Apache-2.0

use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::errors::{WardenError, WardenResult};

/// Maximum allowed length for a regex pattern string.
pub const MAX_PATTERN_LENGTH: usize = 500;

/// Mask used when a rule does not name one.
pub const DEFAULT_MASK: &str = "[REDACTED]";

/// A single named regex-to-mask rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(default)]
pub struct PatternRule {
    /// Unique identifier for the rule (e.g., "email").
    pub name: String,
    /// Human-readable description of what the rule targets.
    pub description: Option<String>,
    /// The regex pattern string.
    pub pattern: String,
    /// Literal that replaces every match.
    pub mask: String,
    /// Compile the pattern case-insensitively.
    pub case_insensitive: bool,
    /// Explicit override for enabling/disabling the rule.
    pub enabled: Option<bool>,
}

impl Default for PatternRule {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            pattern: String::new(),
            mask: DEFAULT_MASK.to_string(),
            case_insensitive: false,
            enabled: None,
        }
    }
}

impl PatternRule {
    /// Shorthand for a custom rule built in code.
    pub fn new(name: impl Into<String>, pattern: impl Into<String>, mask: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            mask: mask.into(),
            ..Default::default()
        }
    }

    /// A rule is active unless it was explicitly disabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled != Some(false)
    }
}

/// An ordered set of pattern rules.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Hash)]
pub struct PatternConfig {
    #[serde(default)]
    pub patterns: Vec<PatternRule>,
}

impl PatternConfig {
    /// Loads pattern rules from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> WardenResult<Self> {
        let path = path.as_ref();
        info!("Loading custom patterns from: {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text).map_err(|e| match e {
            WardenError::Serialization(msg) => {
                WardenError::Serialization(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        info!("Loaded {} patterns from file {}.", config.patterns.len(), path.display());
        Ok(config)
    }

    /// Parses and validates a YAML pattern document.
    pub fn from_yaml_str(text: &str) -> WardenResult<Self> {
        let config: PatternConfig =
            serde_yml::from_str(text).map_err(|e| WardenError::Serialization(e.to_string()))?;
        validate_rules(&config.patterns)?;
        Ok(config)
    }

    /// Loads the built-in PII patterns.
    pub fn load_default_rules() -> WardenResult<Self> {
        debug!("Loading default patterns from embedded string...");
        let default_yaml = include_str!("../config/default_patterns.yaml");
        let config: PatternConfig = serde_yml::from_str(default_yaml)
            .map_err(|e| WardenError::Serialization(format!("default patterns: {}", e)))?;

        debug!("Loaded {} default patterns.", config.patterns.len());
        Ok(config)
    }

    /// Names of the rules in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.patterns.iter().map(|r| r.name.as_str()).collect()
    }

    /// Filters active rules based on enable/disable lists.
    ///
    /// A non-empty `enable_rules` list keeps only the named rules; names in
    /// `disable_rules` are always removed. Unknown names are logged.
    pub fn set_active_rules(&mut self, enable_rules: &[String], disable_rules: &[String]) {
        let enable_set: HashSet<&str> = enable_rules.iter().map(String::as_str).collect();
        let disable_set: HashSet<&str> = disable_rules.iter().map(String::as_str).collect();

        debug!("Initial pattern count before filtering: {}", self.patterns.len());

        let all_rule_names: HashSet<&str> = self.patterns.iter().map(|r| r.name.as_str()).collect();

        for rule_name in enable_set.difference(&all_rule_names) {
            warn!("Pattern '{}' in `enable_patterns` list does not exist.", rule_name);
        }

        for rule_name in disable_set.difference(&all_rule_names) {
            warn!("Pattern '{}' in `disable_patterns` list does not exist.", rule_name);
        }

        self.patterns.retain(|rule| {
            let name = rule.name.as_str();
            !disable_set.contains(name) && (enable_set.is_empty() || enable_set.contains(name))
        });

        debug!("Final active pattern count after filtering: {}", self.patterns.len());
    }
}

/// Merges user-defined rules over the defaults.
///
/// A user rule whose name already exists replaces the default in place;
/// new names are appended after the defaults, in the user's order.
pub fn merge_rules(default_config: PatternConfig, user_config: Option<PatternConfig>) -> PatternConfig {
    debug!("merge_rules called. Initial default patterns count: {}", default_config.patterns.len());

    let mut merged = default_config.patterns;

    if let Some(user_cfg) = user_config {
        debug!("User config provided. Merging {} user patterns.", user_cfg.patterns.len());
        for user_rule in user_cfg.patterns {
            match merged.iter_mut().find(|r| r.name == user_rule.name) {
                Some(existing) => {
                    debug!("Overriding pattern '{}' with user definition.", user_rule.name);
                    *existing = user_rule;
                }
                None => merged.push(user_rule),
            }
        }
    }

    debug!("Final total patterns after merge: {}", merged.len());
    PatternConfig { patterns: merged }
}

/// Validates rule integrity: names, emptiness, length and regex syntax.
pub fn validate_rules(rules: &[PatternRule]) -> WardenResult<()> {
    let mut rule_names = HashSet::new();
    let mut errors = Vec::new();

    for rule in rules {
        if rule.name.is_empty() {
            errors.push("A pattern has an empty `name` field.".to_string());
        } else if !rule_names.insert(rule.name.as_str()) {
            errors.push(format!("Duplicate pattern name found: '{}'.", rule.name));
        }

        if rule.pattern.is_empty() {
            errors.push(format!("Pattern '{}' has an empty `pattern` field.", rule.name));
            continue;
        }

        if rule.pattern.len() > MAX_PATTERN_LENGTH {
            errors.push(format!(
                "Pattern '{}' is {} bytes long, the limit is {}.",
                rule.name,
                rule.pattern.len(),
                MAX_PATTERN_LENGTH
            ));
            continue;
        }

        if let Err(e) = Regex::new(&rule.pattern) {
            errors.push(format!("Pattern '{}' has an invalid regex: {}", rule.name, e));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(WardenError::InvalidPatternConfig(format!(
            "Pattern validation failed:\n{}",
            errors.join("\n")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules_keep_registration_order() {
        let config = PatternConfig::load_default_rules().unwrap();
        assert_eq!(
            config.names(),
            vec!["email", "phone_us", "phone_intl", "ssn", "credit_card", "ip_address", "api_key"]
        );
        validate_rules(&config.patterns).unwrap();
    }

    #[test]
    fn merge_replaces_in_place_and_appends_new() {
        let defaults = PatternConfig {
            patterns: vec![
                PatternRule::new("email", "a", "[EMAIL]"),
                PatternRule::new("ssn", "b", "[SSN]"),
            ],
        };
        let user = PatternConfig {
            patterns: vec![
                PatternRule::new("order_id", "ORD-\\d+", "[ORDER]"),
                PatternRule::new("email", "c", "[MAIL]"),
            ],
        };
        let merged = merge_rules(defaults, Some(user));
        assert_eq!(merged.names(), vec!["email", "ssn", "order_id"]);
        assert_eq!(merged.patterns[0].mask, "[MAIL]");
    }

    #[test]
    fn set_active_rules_filters() {
        let mut config = PatternConfig::load_default_rules().unwrap();
        config.set_active_rules(&[], &["ip_address".to_string()]);
        assert!(!config.names().contains(&"ip_address"));

        config.set_active_rules(&["email".to_string(), "ssn".to_string()], &[]);
        assert_eq!(config.names(), vec!["email", "ssn"]);
    }

    #[test]
    fn validation_rejects_duplicates_and_bad_regex() {
        let rules = vec![
            PatternRule::new("dup", "x", "[X]"),
            PatternRule::new("dup", "y", "[Y]"),
            PatternRule::new("broken", "(unclosed", "[B]"),
        ];
        let err = validate_rules(&rules).unwrap_err().to_string();
        assert!(err.contains("Duplicate pattern name found: 'dup'"));
        assert!(err.contains("Pattern 'broken' has an invalid regex"));
    }
}
