// codewarden/src/commands/mod.rs
//! Subcommand implementations.

pub mod check_dsn;
pub mod patterns;
pub mod scrub;
pub mod send;

use anyhow::{Context, Result};
use log::debug;
use std::path::PathBuf;

use codewarden_core::{Airlock, PatternConfig};

use crate::cli::PatternArgs;

/// `<config dir>/codewarden/patterns.yaml`, picked up when `--config` is not
/// given and the file exists.
pub fn default_patterns_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("codewarden").join("patterns.yaml"))
}

/// Loads the custom pattern file named by `--config`, or the per-user one.
pub fn load_custom_patterns(args: &PatternArgs) -> Result<Option<PatternConfig>> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => match default_patterns_path().filter(|p| p.is_file()) {
            Some(path) => {
                debug!("Using per-user pattern file {}", path.display());
                path
            }
            None => return Ok(None),
        },
    };

    let config = PatternConfig::load_from_file(&path)
        .with_context(|| format!("Failed to load pattern file {}", path.display()))?;
    Ok(Some(config))
}

pub fn build_airlock(args: &PatternArgs) -> Result<Airlock> {
    let custom = load_custom_patterns(args)?;
    Airlock::from_parts(custom, &args.enable, &args.disable).context("Failed to build the pattern set")
}
