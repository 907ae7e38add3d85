//! Synchronization between the vault and the scheduling service.

pub mod debounce;
pub mod engine;
pub mod outbound;
pub mod sinks;
pub mod state;
pub mod types;

pub use debounce::Debouncer;
pub use engine::SynchronizationEngine;
pub use outbound::{OutboundReport, OutboundSync};
pub use sinks::{RemoteSink, TaskSink, VaultSink};
pub use state::{
    JsonStateStore, MemoryStateStore, StateError, StateStore, SyncCheckpoint, SyncState,
    SyncedLines,
};
pub use types::*;
