use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::digest::Digest;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialization(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Data corrupted: expected {expected}, got {actual}")]
    DataCorrupted { expected: Digest, actual: Digest },
}

impl TransferError {
    /// True for a digest mismatch, as opposed to an I/O or setup failure.
    pub fn is_corruption(&self) -> bool {
        matches!(self, TransferError::DataCorrupted { .. })
    }
}
