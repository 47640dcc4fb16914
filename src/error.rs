use std::io;

use thiserror::Error;

/// Unified error type for both storage engines.
///
/// A key that is simply not there is never an error: lookups return
/// `Option` and deletes report whether anything was removed.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error from disk operations (log append, segment read/write, mkdir).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A durable record could not be decoded (bad field count, bad integer).
    #[error("Corruption: {0}")]
    Corruption(String),

    /// A caller-supplied key, value or option the on-disk formats can't hold.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias used throughout the engines.
pub type Result<T> = std::result::Result<T, Error>;
