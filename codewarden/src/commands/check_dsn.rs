// codewarden/src/commands/check_dsn.rs
//! `codewarden check-dsn`: validate a connection string.

use anyhow::{Context, Result};

use codewarden_core::Dsn;

pub fn run_check_dsn(raw: &str) -> Result<()> {
    let dsn = Dsn::parse(raw).context("DSN is not valid")?;
    println!("dsn:      {}", dsn);
    println!("endpoint: {}", dsn.telemetry_url());
    println!("host:     {}", dsn.host());
    if let Some(port) = dsn.port() {
        println!("port:     {}", port);
    }
    Ok(())
}
