// codewarden/src/commands/patterns.rs
//! `codewarden patterns`: list the rules a client with the same settings
//! would apply.

use anyhow::Result;
use serde::Serialize;

use crate::cli::PatternsCommand;
use crate::commands::build_airlock;

#[derive(Serialize)]
struct RuleListing<'a> {
    name: &'a str,
    mask: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

pub fn run_patterns(cmd: PatternsCommand) -> Result<()> {
    let airlock = build_airlock(&cmd.patterns)?;
    let listings: Vec<RuleListing<'_>> = airlock
        .config()
        .patterns
        .iter()
        .filter(|r| r.is_enabled())
        .map(|r| RuleListing {
            name: &r.name,
            mask: &r.mask,
            description: r.description.as_deref(),
        })
        .collect();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
    } else {
        for rule in &listings {
            println!("{:<14} {}", rule.name, rule.mask);
        }
    }
    Ok(())
}
