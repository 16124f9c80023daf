//! Error types for tablelog
//!
//! Provides a unified error type for all table and blob operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::id::Id;

/// Result type alias using TableError
pub type Result<T> = std::result::Result<T, TableError>;

/// Unified error type for tablelog operations
#[derive(Debug, Error)]
pub enum TableError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Load Errors (fatal to opening a table)
    // -------------------------------------------------------------------------
    #[error("Invalid schema header in {}: {reason}", path.display())]
    InvalidHeader { path: PathBuf, reason: String },

    #[error("Malformed row in {} line {line}: {source}", path.display())]
    MalformedRow {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid row in {} line {line}: {source}", path.display())]
    InvalidRow {
        path: PathBuf,
        line: usize,
        #[source]
        source: ValidationError,
    },

    // -------------------------------------------------------------------------
    // Row Errors
    // -------------------------------------------------------------------------
    #[error("id required{}", .line.map(|l| format!(" (line {l})")).unwrap_or_default())]
    ZeroId { line: Option<usize> },

    #[error("Duplicate ID {0}")]
    DuplicateId(Id),

    #[error("Invalid row: {0}")]
    Validation(#[from] ValidationError),

    #[error("Row {0} not found")]
    NotFound(Id),

    #[error("Invalid ID: {0}")]
    InvalidId(String),

    // -------------------------------------------------------------------------
    // Blob Errors
    // -------------------------------------------------------------------------
    #[error("Invalid blob ref: {0}")]
    InvalidBlobRef(String),

    #[error("Blob is unset")]
    UnsetBlob,

    #[error("Blob has no store attached")]
    NoBlobStore,
}

/// Rejection returned by [`Row::validate`](crate::Row::validate).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
