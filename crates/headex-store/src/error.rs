//! Error types for the store module.

use headex_core::CoreError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested header (or part of a range) is not stored.
    #[error("header not found: {0}")]
    NotFound(String),

    /// Range bounds that describe no headers.
    #[error("invalid range: [{from}, {to})")]
    InvalidRange { from: u64, to: u64 },

    /// A different header already occupies this height.
    #[error("conflict at height {height}: existing header {existing}")]
    Conflict { height: u64, existing: String },

    /// `init` called on a store that already holds headers.
    #[error("store is already initialized")]
    AlreadyInitialized,

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored header bytes failed to decode.
    #[error("corrupt header: {0}")]
    Corrupt(#[from] CoreError),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    #[error("store lock poisoned")]
    LockPoisoned,

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
