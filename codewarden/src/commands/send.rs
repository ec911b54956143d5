// codewarden/src/commands/send.rs
//! `codewarden send`: capture one message and wait for its delivery.

use anyhow::{bail, Context, Result};
use log::debug;

use codewarden_core::{CaptureRequest, Client, ClientOptions};

use crate::cli::SendCommand;

pub async fn run_send(cmd: SendCommand) -> Result<()> {
    let options = build_options(&cmd)?;
    let client = Client::init(options).context("Failed to initialize the CodeWarden client")?;

    let mut request = CaptureRequest::message(cmd.message.clone(), cmd.level);
    for tag in &cmd.tags {
        let (key, value) = parse_tag(tag)?;
        request = request.with_tag(key, value);
    }

    let event_id = client.capture_event(request);
    println!("event_id: {}", event_id);

    client.close().await;
    let stats = client.transport_stats();
    debug!("Transport stats: {:?}", stats);
    println!(
        "delivered: {}, dropped: {}, attempts: {}",
        stats.delivered,
        stats.dropped_permanent + stats.dropped_exhausted + stats.dropped_overflow,
        stats.attempts
    );

    if stats.delivered == 0 {
        bail!("Event {} was not delivered", event_id);
    }
    Ok(())
}

fn build_options(cmd: &SendCommand) -> Result<ClientOptions> {
    let mut options = match &cmd.options_file {
        Some(path) => ClientOptions::load_from_file(path)
            .with_context(|| format!("Failed to load client options from {}", path.display()))?,
        None => ClientOptions::from_env(),
    };

    if let Some(dsn) = &cmd.dsn {
        options.dsn = dsn.clone();
    }
    if options.dsn.is_empty() {
        bail!("No DSN given. Pass --dsn or set CODEWARDEN_DSN.");
    }
    if let Some(environment) = &cmd.environment {
        options.environment = environment.clone();
    }
    if let Some(release) = &cmd.release {
        options.release = Some(release.clone());
    }
    if cmd.no_scrub {
        options.enable_pii_scrubbing = false;
    }
    Ok(options)
}

fn parse_tag(raw: &str) -> Result<(&str, &str)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => bail!("Invalid tag '{}': expected KEY=VALUE", raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn tags_need_a_key() {
        assert_eq!(parse_tag("region=eu").unwrap(), ("region", "eu"));
        assert_eq!(parse_tag("empty=").unwrap(), ("empty", ""));
        assert!(parse_tag("=eu").is_err());
        assert!(parse_tag("region").is_err());
    }
}
