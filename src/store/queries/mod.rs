//! SQL for each table, as free functions over a borrowed connection.
//!
//! Callers pick the connection (writer transaction or pooled reader); nothing here locks.

pub(crate) mod cases;
pub(crate) mod divergences;
pub(crate) mod patterns;
pub(crate) mod stats;

use chrono::{DateTime, SecondsFormat, Utc};

use super::error::{StoreError, StoreResult};

/// Fixed-width RFC 3339 so text comparison in SQL matches chronological order.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(table: &'static str, id: i64, raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRecord {
            table,
            id,
            reason: format!("bad timestamp '{raw}': {e}"),
        })
}
