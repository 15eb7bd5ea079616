//! Command definitions and structures for the CLI
//!
//! This module contains all the clap-based command line argument definitions,
//! including the main CLI structure and all subcommands.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI structure
#[derive(Parser)]
#[command(name = "apnsd")]
#[command(about = "Push notification relay daemon and producer client")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (default: <config dir>/apnsd/apnsd.toml)
    #[arg(long, global = true, env = "APNSD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Queue one notification with the running daemon
    Push {
        /// Device token as 64 hex characters
        device: String,

        /// JSON payload, base64 encoded
        payload: String,
    },

    /// Daemon management
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },

    /// Ask the daemon to poll the feedback service for expired tokens
    Feedback,

    /// Write a default settings file
    Init {
        /// Force overwrite existing settings
        #[arg(short, long)]
        force: bool,
    },
}

/// Daemon management actions
#[derive(Subcommand)]
pub enum DaemonAction {
    /// Start the daemon
    Start {
        /// Run in detached mode (background)
        #[arg(short = 'd', long)]
        detach: bool,
    },

    /// Stop the daemon
    Stop,

    /// Check daemon status
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_push() {
        let cli = Cli::try_parse_from(["apnsd", "push", "ab", "e30="]).unwrap();
        match cli.command {
            Commands::Push { device, payload } => {
                assert_eq!(device, "ab");
                assert_eq!(payload, "e30=");
            }
            _ => panic!("expected push"),
        }
    }

    #[test]
    fn test_parse_detached_start() {
        let cli = Cli::try_parse_from(["apnsd", "-v", "daemon", "start", "--detach"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Daemon {
                action: DaemonAction::Start { detach: true }
            }
        ));
    }
}
