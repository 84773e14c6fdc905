//! Core error types for studyplan-core.
//!
//! This module defines the error hierarchy using thiserror. Note that two
//! conditions are deliberately *not* errors anywhere in the library:
//! capacity exhaustion (routed to overflow) and read-only calendars
//! (writes are skipped and the batch continues).

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for studyplan-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Calendar collaborator errors
    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),

    /// Recurrence expansion errors
    #[error("Recurrence error: {0}")]
    Recurrence(#[from] RecurrenceError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from the external calendar capability.
///
/// One event's failure never aborts a reconciliation batch; the applier
/// collects these per event and reports them.
#[derive(Error, Debug)]
pub enum CalendarError {
    /// Event not found by identifier
    #[error("Calendar event not found: {0}")]
    EventNotFound(String),

    /// Underlying store I/O failed (recoverable, retried per event)
    #[error("Calendar I/O failed: {0}")]
    Io(String),

    /// The store refused the write; treated as a skip, never a failure
    #[error("Calendar write not permitted: {0}")]
    PermissionDenied(String),

    /// Malformed event data from the collaborator
    #[error("Malformed calendar event '{id}': {message}")]
    Malformed { id: String, message: String },
}

/// Recurrence expansion errors.
///
/// These are data-integrity guards: the affected task's expansion aborts
/// and is reported, other tasks are unaffected.
#[derive(Error, Debug)]
pub enum RecurrenceError {
    /// Recurring task has no due date
    #[error("Recurring task {task_id} has no due date")]
    MissingDueDate { task_id: uuid::Uuid },

    /// Recurring task has no series identity
    #[error("Recurring task {task_id} has no series id")]
    MissingSeriesId { task_id: uuid::Uuid },

    /// Calendar arithmetic produced no valid date
    #[error("Date arithmetic overflow advancing {base} by {interval} {frequency}")]
    DateOverflow {
        base: chrono::NaiveDate,
        interval: u32,
        frequency: &'static str,
    },
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end ({end}) must be greater than start ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// A tag appeared in more than one exclusive diff bucket
    #[error("Diff references tag {tag} in more than one bucket")]
    DuplicateDiffTag { tag: String },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Storage(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
