//! CLI module for the API key service
//!
//! - `serve`: run the HTTP server (default deployment mode)
//! - `cleanup-expired`: delete expired keys once and exit

pub mod cleanup;
pub mod serve;

use clap::{Parser, Subcommand};

/// Coldflow API key service
#[derive(Parser)]
#[command(name = "coldflow-api-keys")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve,

    /// Remove expired API keys and exit
    CleanupExpired,
}
