// codewarden/src/commands/scrub.rs
//! `codewarden scrub`: run text through the Airlock.

use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::io::{self, Read, Write};

use codewarden_core::{Airlock, Redactor};

use crate::cli::ScrubCommand;
use crate::commands::build_airlock;

pub fn run_scrub(cmd: ScrubCommand) -> Result<()> {
    let input = match &cmd.input_file {
        Some(path) => fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("Failed to read stdin")?;
            buf
        }
    };

    let airlock = build_airlock(&cmd.patterns)?;
    info!("Scrubbing {} bytes with {} patterns.", input.len(), airlock.compiled_patterns().len());

    let mut stdout = io::stdout().lock();
    stdout.write_all(airlock.scrub(&input).as_bytes())?;
    stdout.flush()?;

    if cmd.summary {
        print_summary(&airlock, &input, &mut io::stderr().lock())?;
    }
    Ok(())
}

fn print_summary<W: Write>(airlock: &Airlock, input: &str, out: &mut W) -> Result<()> {
    let summary = airlock.summarize(input);
    if summary.is_empty() {
        writeln!(out, "No PII found.")?;
        return Ok(());
    }
    writeln!(out, "Replacements:")?;
    for item in summary {
        writeln!(out, "  {:<14} {:<12} {}", item.rule_name, item.mask, item.occurrences)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn summary_lists_rules_with_hits() {
        let airlock = Airlock::with_defaults().unwrap();
        let mut out = Vec::new();
        print_summary(&airlock, "a@b.com and c@d.org", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("email"));
        assert!(text.contains('2'));

        let mut out = Vec::new();
        print_summary(&airlock, "nothing here", &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No PII found.\n");
    }
}
