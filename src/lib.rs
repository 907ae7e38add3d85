//! # Vault Task Sync
//!
//! Keeps checkbox tasks written in a markdown vault and the tasks of an
//! external scheduling service in step with each other.
//!
//! ## Architecture Overview
//!
//! - **[`task`]**: Task-line parsing, metadata token extraction and canonical
//!   reconstruction of a line from structured fields
//! - **[`vault`]**: File storage capability, task collection and in-place
//!   line rewrites
//! - **[`compose`]**: Outbound emails and scheduler payloads built from tasks
//! - **[`remote`]**: Scheduling-service client over HTTP
//! - **[`sync`]**: Conflict-aware bidirectional synchronization, persisted
//!   state and the email-per-new-task flow
//! - **[`cli`]**: Argument model and configuration discovery for `vts`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vault_task_sync::{
//!     FsVault, HttpSchedulerClient, RemoteSink, SchedulerClient, SchedulerConfig, SyncConfig,
//!     SynchronizationEngine, TaskCollector, TaskFilter, VaultSink,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let vault = Arc::new(FsVault::new("/path/to/vault"));
//!     let collector = Arc::new(TaskCollector::new(
//!         vault,
//!         TaskFilter::default(),
//!         &["**/*.md".to_string()],
//!     ));
//!     let client = Arc::new(HttpSchedulerClient::new(SchedulerConfig::default())?);
//!     let config = SyncConfig::default();
//!
//!     let engine = SynchronizationEngine::new(
//!         config.clone(),
//!         Arc::new(VaultSink::new(collector.clone(), "Tasks.md")),
//!         Arc::new(RemoteSink::new(client.clone(), config.priority_to_remote.clone())),
//!     );
//!
//!     let vault_tasks = collector.collect_tasks().await?;
//!     let remote_tasks = client.list_tasks().await?;
//!     let status = engine.synchronize(&vault_tasks, &remote_tasks).await?;
//!     println!("{}", status.summary());
//!     Ok(())
//! }
//! ```

/// Task-line parsing and normalization.
///
/// Recognizes checkbox list items, strips metadata tokens (priority,
/// emoji-coded dates, tags) and rebuilds canonical task lines.
pub mod task;

/// Vault file storage and task collection.
pub mod vault;

/// Outbound message and payload composition.
pub mod compose;

/// Scheduling-service collaborator.
pub mod remote;

/// Synchronization engine, sync state and the outbound email flow.
pub mod sync;

/// Environment constants and path utilities.
///
/// Centralizes all hardcoded paths and directory names used throughout
/// the application for easier maintenance and consistency.
pub mod env;

// CLI module for command-line interface
pub mod cli;

// Re-export main task types
pub use task::{CanonicalTask, ParsedTask, TaskFields, TaskFilter, TaskLineParser, TaskLocation};

// Re-export vault types
pub use vault::{FileStore, FsVault, MemoryVault, TaskCollector, VaultConfig, VaultError};

// Re-export composition types
pub use compose::{EmailConfig, EmailSender, OutboundMessage, OutboxSender, PriorityMap};

// Re-export scheduler types
pub use remote::{
    ExternalTask, HttpSchedulerClient, MemoryScheduler, RemoteError, SchedulerClient,
    SchedulerConfig,
};

// Re-export sync types
pub use sync::{
    ConflictStrategy, JsonStateStore, OutboundSync, RemoteSink, SyncConfig, SyncDirection,
    SyncError, SyncStatus, SynchronizationEngine, VaultSink,
};
