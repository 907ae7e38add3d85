//! Command line argument parsing
//!
//! This module handles CLI argument parsing with subcommands:
//! - `collect`: List the tasks found in the vault
//! - `compose`: Print the outbound messages a file would produce
//! - `send`: Email not-yet-sent tasks of a file through the outbox
//! - `sync`: Run one synchronization pass against the scheduler
//! - `watch`: Run synchronization passes on an interval
//! - `test-connection`: Check scheduler credentials and reachability
//! - `show-config`: Show configuration discovery information
//! - `init-config`: Write a default user configuration file

use crate::sync::{ConflictStrategy, SyncDirection};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    pub config_override: Option<PathBuf>,
    pub vault_override: Option<PathBuf>,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    Collect { include_completed: bool },
    Compose { file: Option<String> },
    Send { file: String },
    Sync(SyncOverrides),
    Watch {
        overrides: SyncOverrides,
        interval_secs: Option<u64>,
    },
    TestConnection,
    ShowConfig,
    InitConfig,
}

/// Command-line replacements for `[sync]` settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOverrides {
    pub strategy: Option<ConflictStrategy>,
    pub direction: Option<SyncDirection>,
}

#[derive(Debug, Parser)]
#[command(name = "vts")]
#[command(author = "Vault Task Sync Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Synchronizes checkbox tasks between a markdown vault and an external scheduling service"
)]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
    /// Vault root directory
    #[arg(long = "vault", global = true)]
    pub vault: Option<PathBuf>,
    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the tasks found in the vault
    Collect {
        /// Include completed tasks regardless of configuration
        #[arg(short = 'a', long = "all")]
        all: bool,
    },
    /// Print the outbound messages for new tasks without sending them
    Compose {
        /// Vault-relative file; all eligible files when omitted
        file: Option<String>,
    },
    /// Email not-yet-sent tasks of a file
    Send {
        /// Vault-relative file
        file: String,
    },
    /// Run one synchronization pass
    Sync {
        /// Conflict strategy for this run
        #[arg(long = "strategy", value_enum)]
        strategy: Option<ConflictStrategy>,
        /// Restrict which side is written
        #[arg(long = "direction", value_enum)]
        direction: Option<SyncDirection>,
    },
    /// Run synchronization passes until interrupted
    Watch {
        /// Seconds between passes
        #[arg(short = 'i', long = "interval")]
        interval: Option<u64>,
        /// Conflict strategy for every pass
        #[arg(long = "strategy", value_enum)]
        strategy: Option<ConflictStrategy>,
        /// Restrict which side is written
        #[arg(long = "direction", value_enum)]
        direction: Option<SyncDirection>,
    },
    /// Check scheduler credentials and reachability
    TestConnection,
    /// Show configuration discovery information
    ShowConfig,
    /// Write a default configuration file to ~/.vts/config.toml
    InitConfig,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn global_options(&self) -> GlobalOptions {
        GlobalOptions {
            config_override: self.config.clone(),
            vault_override: self.vault.clone(),
            verbose: self.verbose,
        }
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Collect { all }) => Ok(ExecutionMode::Collect {
                include_completed: *all,
            }),
            Some(Commands::Compose { file }) => Ok(ExecutionMode::Compose { file: file.clone() }),
            Some(Commands::Send { file }) => {
                if file.trim().is_empty() {
                    return Err("send requires a vault-relative file".to_string());
                }
                Ok(ExecutionMode::Send { file: file.clone() })
            }
            Some(Commands::Sync {
                strategy,
                direction,
            }) => Ok(ExecutionMode::Sync(SyncOverrides {
                strategy: *strategy,
                direction: *direction,
            })),
            Some(Commands::Watch {
                interval,
                strategy,
                direction,
            }) => {
                if *interval == Some(0) {
                    return Err("watch interval must be at least one second".to_string());
                }
                Ok(ExecutionMode::Watch {
                    overrides: SyncOverrides {
                        strategy: *strategy,
                        direction: *direction,
                    },
                    interval_secs: *interval,
                })
            }
            Some(Commands::TestConnection) => Ok(ExecutionMode::TestConnection),
            Some(Commands::ShowConfig) => Ok(ExecutionMode::ShowConfig),
            Some(Commands::InitConfig) => Ok(ExecutionMode::InitConfig),
            None => {
                Err("No command specified. Use 'vts --help' to see available commands.".to_string())
            }
        }
    }
}
