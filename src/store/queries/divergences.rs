use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use super::{parse_timestamp, timestamp};
use crate::model::{Divergence, Engine};
use crate::store::error::{StoreResult, corrupt, storage_err};

pub(crate) struct NewDivergence<'a> {
    pub pattern_id: i64,
    pub page_num: u32,
    pub expected_confidence: f64,
    pub actual_confidence: f64,
    pub engine_used: &'a Engine,
    pub recorded_at: DateTime<Utc>,
}

pub(crate) fn insert(conn: &Connection, new: &NewDivergence<'_>) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO divergences (
            pattern_id, page_num, expected_confidence, actual_confidence, engine_used, recorded_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            new.pattern_id,
            new.page_num,
            new.expected_confidence,
            new.actual_confidence,
            new.engine_used.as_str(),
            timestamp(new.recorded_at),
        ],
    )
    .map_err(storage_err("record divergence"))?;
    Ok(conn.last_insert_rowid())
}

/// Divergences of one pattern, oldest first.
pub(crate) fn for_pattern(conn: &Connection, pattern_id: i64) -> StoreResult<Vec<Divergence>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, pattern_id, page_num, expected_confidence, actual_confidence,
                    engine_used, recorded_at
             FROM divergences WHERE pattern_id = ?1 ORDER BY id",
        )
        .map_err(storage_err("load divergences"))?;

    let rows = stmt
        .query_map(params![pattern_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })
        .map_err(storage_err("load divergences"))?;

    let mut divergences = Vec::new();
    for row in rows {
        let (id, pattern_id, page_num, expected, actual, engine, recorded_at) =
            row.map_err(storage_err("load divergences"))?;
        divergences.push(Divergence {
            id,
            pattern_id,
            page_num,
            expected_confidence: expected,
            actual_confidence: actual,
            engine_used: Engine::new(engine).map_err(corrupt("divergences", id))?,
            recorded_at: parse_timestamp("divergences", id, &recorded_at)?,
        });
    }
    Ok(divergences)
}
