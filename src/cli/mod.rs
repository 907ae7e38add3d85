//! CLI-specific functionality for vault task sync
//!
//! This module contains the argument model of the `vts` binary and the
//! configuration discovery it relies on.

pub mod args;
pub mod config;

pub use args::{Args, Commands, ExecutionMode, GlobalOptions, SyncOverrides};
pub use config::{AppConfig, ConfigDiscovery, ConfigError};
