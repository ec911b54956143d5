//! compiler.rs - Manages the compilation and caching of pattern rules.
//!
//! This module converts a `PatternConfig` into `CompiledPatterns`, ready for
//! the Airlock. Compilation happens once, at construction time, and any
//! failure is a configuration error. Compiled sets are kept in a global
//! cache keyed by a hash of the rule set.
//!
//! License: MIT OR APACHE 2.0

use lazy_static::lazy_static;
use log::debug;
use regex::{Regex, RegexBuilder};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::{PatternConfig, PatternRule, MAX_PATTERN_LENGTH};
use crate::errors::{WardenError, WardenResult};

/// A single compiled pattern rule.
#[derive(Debug)]
pub struct CompiledPattern {
    /// The compiled regular expression used for matching.
    pub regex: Regex,
    /// The literal every match is replaced with.
    pub mask: String,
    /// The unique name of the rule.
    pub name: String,
}

/// All compiled rules, in registration order.
#[derive(Debug, Default)]
pub struct CompiledPatterns {
    pub patterns: Vec<CompiledPattern>,
}

impl CompiledPatterns {
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.name.as_str())
    }
}

lazy_static! {
    /// A thread-safe, global cache for compiled pattern sets.
    /// The key is a hash of the `PatternConfig`, order included.
    static ref COMPILED_PATTERNS_CACHE: RwLock<HashMap<u64, Arc<CompiledPatterns>>> =
        RwLock::new(HashMap::new());
}

/// Order matters for masking, so unlike a plain rule-set hash the rules are
/// hashed in registration order.
fn hash_config(config: &PatternConfig) -> u64 {
    let mut hasher = DefaultHasher::new();
    config.hash(&mut hasher);
    hasher.finish()
}

/// Compiles the enabled rules of a list into `CompiledPatterns`.
///
/// Disabled rules are skipped. Every failure is collected; a single failure
/// is returned as-is, several are folded into one `InvalidPatternConfig`.
pub fn compile_rules(rules_to_compile: &[PatternRule]) -> WardenResult<CompiledPatterns> {
    debug!("Starting compilation of {} patterns.", rules_to_compile.len());

    let mut compiled = Vec::with_capacity(rules_to_compile.len());
    let mut errors = Vec::new();

    for rule in rules_to_compile.iter().filter(|r| r.is_enabled()) {
        if rule.pattern.len() > MAX_PATTERN_LENGTH {
            errors.push(WardenError::PatternLengthExceeded(
                rule.name.clone(),
                rule.pattern.len(),
                MAX_PATTERN_LENGTH,
            ));
            continue;
        }

        let regex_result = RegexBuilder::new(&rule.pattern)
            .case_insensitive(rule.case_insensitive)
            .size_limit(10 * (1 << 20)) // 10 MB limit for compiled regex
            .build();

        match regex_result {
            Ok(regex) => {
                log::debug!(
                    target: "codewarden_core::sanitizer",
                    "Pattern '{}' compiled successfully.",
                    &rule.name
                );
                compiled.push(CompiledPattern {
                    regex,
                    mask: rule.mask.clone(),
                    name: rule.name.clone(),
                });
            }
            Err(e) => errors.push(WardenError::PatternCompilation(rule.name.clone(), e)),
        }
    }

    match errors.len() {
        0 => {
            debug!("Finished compiling patterns. Total compiled: {}.", compiled.len());
            Ok(CompiledPatterns { patterns: compiled })
        }
        1 => Err(errors.remove(0)),
        n => {
            let message = errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n");
            Err(WardenError::InvalidPatternConfig(format!(
                "Failed to compile {} pattern(s):\n{}",
                n, message
            )))
        }
    }
}

/// Gets a `CompiledPatterns` instance from the cache or compiles it.
pub fn get_or_compile_rules(config: &PatternConfig) -> WardenResult<Arc<CompiledPatterns>> {
    let cache_key = hash_config(config);

    {
        let cache = COMPILED_PATTERNS_CACHE.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(patterns) = cache.get(&cache_key) {
            debug!("Serving compiled patterns from cache for key: {}", cache_key);
            return Ok(Arc::clone(patterns));
        }
    }

    debug!("Compiled patterns not found in cache. Compiling now.");
    let compiled = Arc::new(compile_rules(&config.patterns)?);

    COMPILED_PATTERNS_CACHE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(cache_key, Arc::clone(&compiled));

    debug!("Successfully compiled and cached patterns for key: {}", cache_key);
    Ok(compiled)
}
