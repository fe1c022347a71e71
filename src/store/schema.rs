//! Schema migrations tracked with `PRAGMA user_version`.

use rusqlite::Connection;
use tracing::info;

use super::error::{StoreError, StoreResult, storage_err};

/// Highest schema version this build understands.
pub const SCHEMA_VERSION: u32 = 1;

const V001_INITIAL: &str = "
CREATE TABLE IF NOT EXISTS cases (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    origin      TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS patterns (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id              INTEGER NOT NULL REFERENCES cases(id),
    pattern_type         TEXT NOT NULL,
    signature_hash       TEXT NOT NULL,
    signature_vector     BLOB NOT NULL,
    first_seen_page      INTEGER NOT NULL,
    last_seen_page       INTEGER NOT NULL,
    created_by_engine    TEXT NOT NULL,
    engine_quality_score REAL NOT NULL CHECK (engine_quality_score BETWEEN 0.0 AND 1.0),
    avg_confidence       REAL NOT NULL CHECK (avg_confidence BETWEEN 0.0 AND 1.0),
    suggested_bbox       TEXT,
    suggested_engine     TEXT NOT NULL,
    occurrence_count     INTEGER NOT NULL DEFAULT 1 CHECK (occurrence_count >= 1),
    divergence_count     INTEGER NOT NULL DEFAULT 0 CHECK (divergence_count >= 0),
    deprecated           INTEGER NOT NULL DEFAULT 0 CHECK (deprecated IN (0, 1)),
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL,
    UNIQUE (case_id, signature_hash)
);

CREATE INDEX IF NOT EXISTS idx_patterns_scan
    ON patterns (pattern_type, deprecated, occurrence_count);
CREATE INDEX IF NOT EXISTS idx_patterns_case
    ON patterns (case_id, deprecated);
CREATE INDEX IF NOT EXISTS idx_patterns_engine
    ON patterns (created_by_engine);

CREATE TABLE IF NOT EXISTS divergences (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    pattern_id          INTEGER NOT NULL REFERENCES patterns(id),
    page_num            INTEGER NOT NULL,
    expected_confidence REAL NOT NULL,
    actual_confidence   REAL NOT NULL,
    engine_used         TEXT NOT NULL,
    recorded_at         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_divergences_pattern
    ON divergences (pattern_id);

CREATE TRIGGER IF NOT EXISTS patterns_deprecation_is_final
BEFORE UPDATE OF deprecated ON patterns
WHEN OLD.deprecated = 1 AND NEW.deprecated = 0
BEGIN
    SELECT RAISE(ABORT, 'deprecated patterns cannot be reactivated');
END;

CREATE TRIGGER IF NOT EXISTS patterns_counters_monotonic
BEFORE UPDATE ON patterns
WHEN NEW.occurrence_count < OLD.occurrence_count
  OR NEW.divergence_count < OLD.divergence_count
  OR NEW.engine_quality_score < OLD.engine_quality_score
BEGIN
    SELECT RAISE(ABORT, 'pattern counters and quality only increase');
END;
";

/// Brings the schema up to [`SCHEMA_VERSION`].
///
/// A database written by a newer build is refused rather than guessed at.
pub fn migrate(conn: &mut Connection) -> StoreResult<()> {
    let current = current_version(conn)?;

    if current > SCHEMA_VERSION {
        return Err(StoreError::StorageUnavailable {
            operation: "migrate",
            reason: format!(
                "database schema version {current} is newer than supported version {SCHEMA_VERSION}"
            ),
        });
    }

    let migrations: &[(&str, u32)] = &[(V001_INITIAL, 1)];

    for (sql, version) in migrations {
        if current < *version {
            let tx = conn.transaction().map_err(storage_err("migrate"))?;
            tx.execute_batch(sql).map_err(storage_err("migrate"))?;
            tx.pragma_update(None, "user_version", version)
                .map_err(storage_err("migrate"))?;
            tx.commit().map_err(storage_err("migrate"))?;
            info!(version = version, "applied migration");
        }
    }

    Ok(())
}

pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(storage_err("schema version"))
}
