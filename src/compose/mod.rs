//! Outbound composition: emails for the scheduler's intake address and
//! payloads for its REST API.

pub mod email;
pub mod payload;
pub mod types;

use std::path::PathBuf;
use thiserror::Error;

pub use email::*;
pub use payload::*;
pub use types::*;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("No destination address configured")]
    MissingRecipient,

    #[error("IO error writing '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Email transport failed: {0}")]
    Transport(String),
}
