//! Module loading errors

use thiserror::Error;

/// Reasons a file cannot be loaded as a module
#[derive(Error, Debug)]
pub enum LoadError {
    /// File could not be read
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// File shorter than a module header
    #[error("file too short to be a module ({len} bytes)")]
    TooShort { len: usize },

    /// Signature not recognized
    #[error("unrecognized module format")]
    UnknownFormat,

    /// Order list is empty
    #[error("module has an empty order list")]
    EmptySong,

    /// Pattern data ends early
    #[error("pattern data truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
}
