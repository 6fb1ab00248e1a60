//! CLI command definitions using clap.
//!
//! - run: start a loop, feed it work, stop it and summarize
//! - config: print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// bgloop - drive a dedicated-thread background loop
#[derive(Parser, Debug)]
#[command(name = "bgloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a background loop for a while and report its activity
    Run {
        /// Heartbeat in milliseconds (overrides config)
        #[arg(long)]
        heartbeat_ms: Option<u64>,

        /// Number of fire-and-forget actions to submit (overrides config)
        #[arg(short, long)]
        actions: Option<usize>,

        /// How long to keep the loop running, in milliseconds (overrides config)
        #[arg(short, long)]
        duration_ms: Option<u64>,
    },

    /// Print the effective configuration as YAML
    Config,
}
