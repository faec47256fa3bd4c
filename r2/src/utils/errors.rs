//! Custom error types for r2.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum R2Error {
    #[error("r2 is not initialized at {} (run `r2 --init`)", .0.display())]
    NotInitialized(PathBuf),

    #[error("An entry named '{0}' already exists")]
    EntryExists(String),

    #[error("Invalid entry name: '{0}'")]
    InvalidName(String),

    #[error("No such entry: {0}")]
    EntryNotFound(String),

    #[error("Entry '{name}' has no generation {generation}")]
    GenerationNotFound { name: String, generation: u64 },

    #[error("No such path: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("Blob not found in store: {0}")]
    BlobNotFound(String),

    #[error("Blob {0} does not match its digest")]
    CorruptBlob(String),

    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    #[error("Target already exists: {}", .0.display())]
    TargetExists(PathBuf),

    #[error("Another r2 process holds the lock at {}", .0.display())]
    Locked(PathBuf),

    #[error("Unsupported on this platform: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, R2Error>;
