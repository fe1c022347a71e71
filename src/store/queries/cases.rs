use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::{parse_timestamp, timestamp};
use crate::model::Case;
use crate::store::error::{StoreError, StoreResult, storage_err};

/// Inserts the case unless `external_id` already exists; returns it and whether it was new.
pub(crate) fn get_or_create(
    conn: &Connection,
    external_id: &str,
    origin: &str,
    now: DateTime<Utc>,
) -> StoreResult<(Case, bool)> {
    let inserted = conn
        .execute(
            "INSERT INTO cases (external_id, origin, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(external_id) DO NOTHING",
            params![external_id, origin, timestamp(now)],
        )
        .map_err(storage_err("create case"))?;

    let case = by_external_id(conn, external_id)?.ok_or_else(|| {
        StoreError::ConsistencyViolation {
            reason: format!("case '{external_id}' vanished after insert"),
        }
    })?;

    Ok((case, inserted == 1))
}

pub(crate) fn by_external_id(conn: &Connection, external_id: &str) -> StoreResult<Option<Case>> {
    let row = conn
        .query_row(
            "SELECT id, external_id, origin, created_at FROM cases WHERE external_id = ?1",
            params![external_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()
        .map_err(storage_err("load case"))?;

    row.map(|(id, external_id, origin, created_at)| {
        Ok(Case {
            id,
            external_id,
            origin,
            created_at: parse_timestamp("cases", id, &created_at)?,
        })
    })
    .transpose()
}

pub(crate) fn exists(conn: &Connection, case_id: i64) -> StoreResult<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM cases WHERE id = ?1)",
        params![case_id],
        |row| row.get(0),
    )
    .map_err(storage_err("load case"))
}
