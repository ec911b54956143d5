// codewarden/src/cli.rs
//! Command-line interface definition for the `codewarden` tool.
//! License: MIT OR APACHE 2.0

use clap::{Args, Parser, Subcommand};
use codewarden_core::Level;
use std::path::PathBuf;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(
    name = "codewarden",
    author = "CodeWarden Team",
    version = env!("CARGO_PKG_VERSION"),
    about = "Scrub PII, validate DSNs and send test events with the CodeWarden SDK",
    long_about = "codewarden exercises the CodeWarden Rust SDK from the shell. It runs text through the same PII Airlock the SDK applies to every event, checks connection strings, and sends test events to an ingestion endpoint.",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Suppress all log output.
    #[arg(long, short = 'q', global = true, conflicts_with = "debug")]
    pub quiet: bool,

    /// Enable debug logging.
    #[arg(long, short = 'd', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scrubs a file or stdin and prints the result.
    Scrub(ScrubCommand),

    /// Captures one message and delivers it.
    Send(SendCommand),

    /// Parses a DSN and prints the endpoint it resolves to.
    CheckDsn {
        /// Connection string, e.g. https://API_KEY@ingest.example.com
        dsn: String,
    },

    /// Lists the effective pattern rules.
    Patterns(PatternsCommand),
}

/// Pattern selection shared by `scrub` and `patterns`.
#[derive(Args, Debug, Clone, Default)]
pub struct PatternArgs {
    /// Custom pattern file (YAML), merged over the defaults.
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable only these rule names (comma-separated).
    #[arg(long, short = 'e', value_delimiter = ',')]
    pub enable: Vec<String>,

    /// Disable these rule names (comma-separated).
    #[arg(long, short = 'x', value_delimiter = ',')]
    pub disable: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ScrubCommand {
    /// Read input from this file instead of stdin.
    #[arg(long = "input", short = 'i', value_name = "FILE")]
    pub input_file: Option<PathBuf>,

    #[command(flatten)]
    pub patterns: PatternArgs,

    /// Print per-rule replacement counts to stderr.
    #[arg(long)]
    pub summary: bool,
}

#[derive(Args, Debug)]
pub struct SendCommand {
    /// Message text.
    #[arg(long, short = 'm')]
    pub message: String,

    /// error, warning, info or debug.
    #[arg(long, short = 'l', default_value = "info")]
    pub level: Level,

    #[arg(long, env = "CODEWARDEN_DSN", hide_env_values = true)]
    pub dsn: Option<String>,

    #[arg(long, env = "CODEWARDEN_ENVIRONMENT")]
    pub environment: Option<String>,

    #[arg(long, env = "CODEWARDEN_RELEASE")]
    pub release: Option<String>,

    /// Client options file (YAML or JSON). Flags override its values.
    #[arg(long = "options", value_name = "FILE")]
    pub options_file: Option<PathBuf>,

    /// Tag as KEY=VALUE; repeatable.
    #[arg(long = "tag", short = 't', value_name = "KEY=VALUE")]
    pub tags: Vec<String>,

    /// Send the message without PII scrubbing.
    #[arg(long)]
    pub no_scrub: bool,
}

#[derive(Args, Debug)]
pub struct PatternsCommand {
    #[command(flatten)]
    pub patterns: PatternArgs,

    /// Print the rules as JSON.
    #[arg(long)]
    pub json: bool,
}
