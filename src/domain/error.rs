//! Error types for the task list core.
//!
//! This module defines the centralized error type [`TaskListError`] and a type alias
//! [`Result`] used throughout the crate. The variants follow the failure taxonomy of
//! the store: validation and lookup failures are recoverable by the caller, storage
//! failures can be retried, and migration failures abort startup.

use crate::domain::item::ItemId;
use thiserror::Error;

/// The main error type for task list operations.
///
/// # Examples
///
/// ```
/// use tasklist::TaskListError;
///
/// let err = TaskListError::Validation("task text must not be blank".to_string());
/// assert!(!err.is_fatal());
/// assert!(!err.is_retryable());
/// ```
#[derive(Debug, Error)]
pub enum TaskListError {
    /// User-correctable input problem (blank or oversized text).
    ///
    /// No store write is attempted when this is returned.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The addressed item no longer exists or is waiting for deletion.
    #[error("Item not found: {0}")]
    NotFound(ItemId),

    /// A reorder was computed against a snapshot that is no longer current.
    ///
    /// The caller should re-derive the order from the latest query emission.
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Storage operation failed for a reason other than SQLite itself
    /// (poisoned lock, corrupt column value).
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite reported an error while executing a statement.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem or I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A schema migration step failed; the database was left at its previous version.
    #[error("Migration to schema version {version} failed: {source}")]
    Migration {
        /// Version the failing step was migrating to.
        version: u32,
        /// Underlying SQLite failure.
        #[source]
        source: rusqlite::Error,
    },

    /// The database was written by a newer schema than this build understands.
    #[error("Unsupported schema version {found} (this build supports up to {supported})")]
    UnsupportedSchemaVersion {
        /// Version found on disk.
        found: u32,
        /// Highest version this build can open.
        supported: u32,
    },

    /// Configuration is invalid or could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Communication with the undo worker thread failed.
    #[error("Worker communication error: {0}")]
    Worker(String),
}

impl TaskListError {
    /// Returns `true` for errors that must abort initialization.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Migration { .. } | Self::UnsupportedSchemaVersion { .. }
        )
    }

    /// Returns `true` for runtime storage failures that a single retry may fix.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Sqlite(_) | Self::Io(_))
    }
}

/// A specialized `Result` type for task list operations.
pub type Result<T> = std::result::Result<T, TaskListError>;
