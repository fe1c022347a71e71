use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Params, Row, params};
use tracing::warn;

use super::{parse_timestamp, timestamp};
use crate::model::{BBox, Engine, Pattern, PatternCategory};
use crate::signature::SignatureVector;
use crate::store::error::{
    StoreError, StoreResult, corrupt, corrupt_column, is_unique_violation, storage_err,
};

const PATTERN_COLUMNS: &str = "id, case_id, pattern_type, signature_hash, signature_vector, \
     first_seen_page, last_seen_page, created_by_engine, engine_quality_score, avg_confidence, \
     suggested_bbox, suggested_engine, occurrence_count, divergence_count, deprecated, \
     created_at, updated_at";

/// Raw `patterns` row before domain validation.
struct PatternRow {
    id: i64,
    case_id: i64,
    pattern_type: String,
    signature_hash: String,
    signature_vector: Vec<u8>,
    first_seen_page: u32,
    last_seen_page: u32,
    created_by_engine: String,
    engine_quality_score: f64,
    avg_confidence: f64,
    suggested_bbox: Option<String>,
    suggested_engine: String,
    occurrence_count: u32,
    divergence_count: u32,
    deprecated: bool,
    created_at: String,
    updated_at: String,
}

impl PatternRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            case_id: row.get(1)?,
            pattern_type: row.get(2)?,
            signature_hash: row.get(3)?,
            signature_vector: row.get(4)?,
            first_seen_page: row.get(5)?,
            last_seen_page: row.get(6)?,
            created_by_engine: row.get(7)?,
            engine_quality_score: row.get(8)?,
            avg_confidence: row.get(9)?,
            suggested_bbox: row.get(10)?,
            suggested_engine: row.get(11)?,
            occurrence_count: row.get(12)?,
            divergence_count: row.get(13)?,
            deprecated: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }

    fn decode(self) -> StoreResult<Pattern> {
        let id = self.id;
        let signature = SignatureVector::from_blob(&self.signature_vector, self.signature_hash)
            .map_err(corrupt("patterns", id))?;
        let suggested_bbox = self
            .suggested_bbox
            .as_deref()
            .map(serde_json::from_str::<BBox>)
            .transpose()
            .map_err(|e| StoreError::CorruptRecord {
                table: "patterns",
                id,
                reason: format!("bad bbox: {e}"),
            })?;

        Ok(Pattern {
            id,
            case_id: self.case_id,
            category: self.pattern_type.parse().map_err(corrupt("patterns", id))?,
            signature,
            first_seen_page: self.first_seen_page,
            last_seen_page: self.last_seen_page,
            created_by_engine: Engine::new(self.created_by_engine)
                .map_err(corrupt("patterns", id))?,
            engine_quality_score: self.engine_quality_score,
            avg_confidence: self.avg_confidence,
            suggested_bbox,
            suggested_engine: Engine::new(self.suggested_engine)
                .map_err(corrupt("patterns", id))?,
            occurrence_count: self.occurrence_count,
            divergence_count: self.divergence_count,
            deprecated: self.deprecated,
            created_at: parse_timestamp("patterns", id, &self.created_at)?,
            updated_at: parse_timestamp("patterns", id, &self.updated_at)?,
        })
    }
}

fn encode_bbox(bbox: Option<&BBox>) -> StoreResult<Option<String>> {
    bbox.map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::StorageUnavailable {
            operation: "encode bbox",
            reason: e.to_string(),
        })
}

/// Runs a pattern query, skipping rows that fail to decode.
///
/// Scans feed advisory hints, so one bad row must not hide every other candidate.
fn scan<P: Params>(
    conn: &Connection,
    operation: &'static str,
    sql: &str,
    params: P,
) -> StoreResult<Vec<Pattern>> {
    let mut stmt = conn.prepare_cached(sql).map_err(storage_err(operation))?;
    let rows = stmt
        .query_map(params, PatternRow::from_row)
        .map_err(storage_err(operation))?;

    let mut patterns = Vec::new();
    for row in rows {
        match row.map_err(storage_err(operation))?.decode() {
            Ok(pattern) => patterns.push(pattern),
            Err(e) => warn!(error = %e, operation, "Dropping candidate: undecodable pattern row"),
        }
    }
    Ok(patterns)
}

fn single<P: Params>(
    conn: &Connection,
    operation: &'static str,
    sql: &str,
    params: P,
) -> StoreResult<Option<Pattern>> {
    conn.query_row(sql, params, PatternRow::from_row)
        .optional()
        .map_err(storage_err(operation))?
        .map(PatternRow::decode)
        .transpose()
}

pub(crate) fn get(conn: &Connection, pattern_id: i64) -> StoreResult<Option<Pattern>> {
    single(
        conn,
        "load pattern",
        &format!("SELECT {PATTERN_COLUMNS} FROM patterns WHERE id = ?1"),
        params![pattern_id],
    )
}

pub(crate) fn by_hash(conn: &Connection, case_id: i64, hash: &str) -> StoreResult<Option<Pattern>> {
    single(
        conn,
        "load pattern",
        &format!(
            "SELECT {PATTERN_COLUMNS} FROM patterns WHERE case_id = ?1 AND signature_hash = ?2"
        ),
        params![case_id, hash],
    )
}

/// Non-deprecated patterns of one case, optionally narrowed to a category.
pub(crate) fn active_in_case(
    conn: &Connection,
    case_id: i64,
    category: Option<PatternCategory>,
) -> StoreResult<Vec<Pattern>> {
    scan(
        conn,
        "scan case patterns",
        &format!(
            "SELECT {PATTERN_COLUMNS} FROM patterns
             WHERE case_id = ?1 AND deprecated = 0 AND (?2 IS NULL OR pattern_type = ?2)"
        ),
        params![case_id, category.map(|c| c.as_str())],
    )
}

/// Non-deprecated patterns across every case with at least `min_occurrences` sightings.
pub(crate) fn active_global(
    conn: &Connection,
    category: Option<PatternCategory>,
    min_occurrences: u32,
) -> StoreResult<Vec<Pattern>> {
    scan(
        conn,
        "scan global patterns",
        &format!(
            "SELECT {PATTERN_COLUMNS} FROM patterns
             WHERE deprecated = 0 AND occurrence_count >= ?1
               AND (?2 IS NULL OR pattern_type = ?2)"
        ),
        params![min_occurrences, category.map(|c| c.as_str())],
    )
}

/// Fields of a pattern's first observation.
pub(crate) struct NewPattern<'a> {
    pub case_id: i64,
    pub category: PatternCategory,
    pub signature: &'a SignatureVector,
    pub page_num: u32,
    pub engine: &'a Engine,
    pub quality: f64,
    pub confidence: f64,
    pub bbox: Option<&'a BBox>,
    pub now: DateTime<Utc>,
}

pub(crate) enum InsertOutcome {
    Inserted(i64),
    /// Another writer already holds `(case_id, signature_hash)`.
    Conflict,
}

pub(crate) fn insert(conn: &Connection, new: &NewPattern<'_>) -> StoreResult<InsertOutcome> {
    let now = timestamp(new.now);
    let result = conn.execute(
        "INSERT INTO patterns (
            case_id, pattern_type, signature_hash, signature_vector,
            first_seen_page, last_seen_page, created_by_engine, engine_quality_score,
            avg_confidence, suggested_bbox, suggested_engine,
            occurrence_count, divergence_count, deprecated, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?7, ?8, ?9, ?6, 1, 0, 0, ?10, ?10)",
        params![
            new.case_id,
            new.category.as_str(),
            new.signature.hash(),
            new.signature.to_blob(),
            new.page_num,
            new.engine.as_str(),
            new.quality,
            new.confidence,
            encode_bbox(new.bbox)?,
            now,
        ],
    );

    match result {
        Ok(_) => Ok(InsertOutcome::Inserted(conn.last_insert_rowid())),
        Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Conflict),
        Err(e) => Err(storage_err("insert pattern")(e)),
    }
}

/// Writes back every mutable column of `pattern`.
pub(crate) fn update(conn: &Connection, pattern: &Pattern) -> StoreResult<()> {
    conn.execute(
        "UPDATE patterns SET
            last_seen_page = ?2,
            created_by_engine = ?3,
            engine_quality_score = ?4,
            avg_confidence = ?5,
            suggested_bbox = ?6,
            suggested_engine = ?7,
            occurrence_count = ?8,
            divergence_count = ?9,
            deprecated = ?10,
            updated_at = ?11
         WHERE id = ?1",
        params![
            pattern.id,
            pattern.last_seen_page,
            pattern.created_by_engine.as_str(),
            pattern.engine_quality_score,
            pattern.avg_confidence,
            encode_bbox(pattern.suggested_bbox.as_ref())?,
            pattern.suggested_engine.as_str(),
            pattern.occurrence_count,
            pattern.divergence_count,
            pattern.deprecated,
            timestamp(pattern.updated_at),
        ],
    )
    .map_err(storage_err("update pattern"))?;
    Ok(())
}

pub(crate) fn count(conn: &Connection, case_id: i64, deprecated: bool) -> StoreResult<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM patterns WHERE case_id = ?1 AND deprecated = ?2",
        params![case_id, deprecated],
        |row| row.get(0),
    )
    .map_err(storage_err("count patterns"))
}

/// Engine whose live patterns of `category` have the best mean confidence, then most sightings.
pub(crate) fn best_engine_for_category(
    conn: &Connection,
    category: PatternCategory,
) -> StoreResult<Option<Engine>> {
    let name: Option<String> = conn
        .query_row(
            "SELECT created_by_engine FROM patterns
             WHERE pattern_type = ?1 AND deprecated = 0
             GROUP BY created_by_engine
             ORDER BY AVG(avg_confidence) DESC, SUM(occurrence_count) DESC, created_by_engine ASC
             LIMIT 1",
            params![category.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(storage_err("best engine for category"))?;

    name.map(|n| Engine::new(n).map_err(corrupt_column("patterns", "created_by_engine")))
        .transpose()
}
