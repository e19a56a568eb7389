//! Command-line interface for bifrost-monitor.
//!
//! Provides the status table and rerun dispatch commands.

mod commands;

pub use commands::{parse_cli, render_table, run_with_cli, Cli, Commands};
