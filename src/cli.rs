//! CLI command definitions.
//!
//! The binary is meant to be invoked by an external scheduler; `sync` is
//! the default subcommand so a bare `board-sync` in a crontab runs one
//! pass.

use clap::{Parser, Subcommand};

/// Todoist-to-Miro board sync and OAuth helper
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the cache database (overrides BOARD_SYNC_DB)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one synchronization pass (default if no subcommand given)
    Sync,

    /// Exchange an OAuth authorization code for a board access token
    Oauth,
}
