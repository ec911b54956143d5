// codewarden/src/logger.rs
//! `env_logger` setup for the CLI.

use log::LevelFilter;

/// `--debug` forces Debug, `--quiet` turns logging off, otherwise
/// `RUST_LOG` applies with Warn as the fallback.
pub fn init_logger(debug: bool, quiet: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if quiet {
        builder.filter_level(LevelFilter::Off);
    } else if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.format_timestamp(None).try_init().ok();
}
