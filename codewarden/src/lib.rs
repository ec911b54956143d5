// codewarden/src/lib.rs
//! # CodeWarden CLI
//!
//! Thin command-line layer over `codewarden-core`. Each subcommand lives in
//! `commands` and returns `anyhow::Result` so `main` can report failures
//! with context.

pub mod cli;
pub mod commands;
pub mod logger;
