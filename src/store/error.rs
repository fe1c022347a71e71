use thiserror::Error;

use crate::config::ConfigError;
use crate::model::ValidationError;

/// Errors returned by [`PatternStore`](super::PatternStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Caller supplied malformed input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// SQLite failure, lock timeout, or an unreadable schema.
    #[error("storage unavailable during {operation}: {reason}")]
    StorageUnavailable {
        operation: &'static str,
        reason: String,
    },

    /// Concurrent first insert of the same pattern could not be resolved as an update.
    #[error("consistency violation: {reason}")]
    ConsistencyViolation { reason: String },

    #[error("case {case_id} does not exist")]
    UnknownCase { case_id: i64 },

    /// A stored row could not be decoded into its domain type.
    #[error("corrupt {table} record {id}: {reason}")]
    CorruptRecord {
        table: &'static str,
        id: i64,
        reason: String,
    },

    /// A grouped value (no single owning row) could not be decoded.
    #[error("corrupt value in {table}.{column}: {reason}")]
    CorruptColumn {
        table: &'static str,
        column: &'static str,
        reason: String,
    },
}

impl StoreError {
    /// `true` when the caller should carry on as if no hint were available.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::StorageUnavailable { .. }
                | StoreError::ConsistencyViolation { .. }
                | StoreError::CorruptRecord { .. }
                | StoreError::CorruptColumn { .. }
        )
    }
}

/// Convenience result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Maps a rusqlite error into [`StoreError::StorageUnavailable`] tagged with `operation`.
pub(crate) fn storage_err(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |e| StoreError::StorageUnavailable {
        operation,
        reason: e.to_string(),
    }
}

/// `true` for a UNIQUE constraint failure (the dedup backstop on `(case_id, signature_hash)`).
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub(crate) fn corrupt(table: &'static str, id: i64) -> impl FnOnce(ValidationError) -> StoreError {
    move |e| StoreError::CorruptRecord {
        table,
        id,
        reason: e.to_string(),
    }
}

pub(crate) fn corrupt_column(
    table: &'static str,
    column: &'static str,
) -> impl FnOnce(ValidationError) -> StoreError {
    move |e| StoreError::CorruptColumn {
        table,
        column,
        reason: e.to_string(),
    }
}
