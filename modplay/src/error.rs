//! Error types for modplay
//!
//! Every failure is fail-fast: nothing is retried. `exit_code` maps each
//! variant to the process exit status.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the player
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid option value
    #[error("{0}")]
    Usage(String),

    /// Defaults file could not be read or parsed
    #[error("{0}")]
    Config(#[source] modplay_common::Error),

    /// Module could not be opened
    #[error("{}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    /// Audio device could not be opened or failed while streaming
    #[error("audio device error: {0}")]
    Device(String),

    /// Output file could not be opened, written or finalized
    #[error("{}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Process exit status for this error: 2 for usage and configuration
    /// problems, 1 for runtime failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Usage(_) | Error::Config(_) => 2,
            Error::Load { .. } | Error::Device(_) | Error::Write { .. } => 1,
        }
    }
}

impl From<modplay_common::Error> for Error {
    fn from(err: modplay_common::Error) -> Self {
        match err {
            modplay_common::Error::InvalidInput(message) => Error::Usage(message),
            other => Error::Config(other),
        }
    }
}

/// Convenience Result type using the player Error
pub type Result<T> = std::result::Result<T, Error>;
