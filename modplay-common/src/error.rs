//! Common error types for modplay

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for modplay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across modplay crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be read
    #[error("Configuration error: {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file did not parse
    #[error("Configuration error: {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// Invalid user input or configuration value
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
