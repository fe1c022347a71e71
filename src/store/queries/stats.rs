use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use super::{parse_timestamp, timestamp};
use crate::model::{
    CaseSummary, CategoryStat, DivergenceStats, Engine, EngineStat, PatternCategory,
    RecentPattern, StatsFilter, StoreSummary,
};
use crate::store::error::{StoreResult, corrupt, corrupt_column, storage_err};

fn engine_param(filter: &StatsFilter) -> Option<&str> {
    filter.engine.as_ref().map(Engine::as_str)
}

fn since_param(since: Option<DateTime<Utc>>) -> Option<String> {
    since.map(timestamp)
}

/// Per-engine aggregates over all patterns, deprecated ones included.
pub(crate) fn engine_stats(conn: &Connection, filter: &StatsFilter) -> StoreResult<Vec<EngineStat>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT created_by_engine,
                    COUNT(*),
                    COALESCE(AVG(avg_confidence), 0.0),
                    COALESCE(SUM(occurrence_count), 0),
                    COALESCE(SUM(CASE WHEN deprecated = 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(deprecated), 0)
             FROM patterns
             WHERE (?1 IS NULL OR created_by_engine = ?1)
               AND (?2 IS NULL OR created_at >= ?2)
             GROUP BY created_by_engine
             ORDER BY COUNT(*) DESC, created_by_engine ASC",
        )
        .map_err(storage_err("engine stats"))?;

    let rows = stmt
        .query_map(
            params![engine_param(filter), since_param(filter.since)],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, u64>(3)?,
                    row.get::<_, u64>(4)?,
                    row.get::<_, u64>(5)?,
                ))
            },
        )
        .map_err(storage_err("engine stats"))?;

    let mut stats = Vec::new();
    for row in rows {
        let (engine, total, avg_confidence, occurrences, active, deprecated) =
            row.map_err(storage_err("engine stats"))?;
        stats.push(EngineStat {
            engine: Engine::new(engine).map_err(corrupt_column("patterns", "created_by_engine"))?,
            total_patterns: total,
            avg_confidence,
            total_occurrences: occurrences,
            active_count: active,
            deprecated_count: deprecated,
        });
    }
    Ok(stats)
}

pub(crate) fn summary(conn: &Connection) -> StoreResult<StoreSummary> {
    conn.query_row(
        "SELECT (SELECT COUNT(*) FROM cases),
                COUNT(*),
                COALESCE(SUM(CASE WHEN deprecated = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(deprecated), 0),
                (SELECT COUNT(*) FROM divergences),
                COALESCE(SUM(occurrence_count), 0),
                COALESCE(AVG(avg_confidence), 0.0)
         FROM patterns",
        [],
        |row| {
            Ok(StoreSummary {
                total_cases: row.get(0)?,
                total_patterns: row.get(1)?,
                active_patterns: row.get(2)?,
                deprecated_patterns: row.get(3)?,
                total_divergences: row.get(4)?,
                total_occurrences: row.get(5)?,
                avg_confidence: row.get(6)?,
            })
        },
    )
    .map_err(storage_err("summary"))
}

/// Pattern count and mean confidence per category, with the engine that created most of them.
pub(crate) fn category_distribution(
    conn: &Connection,
    since: Option<DateTime<Utc>>,
) -> StoreResult<Vec<CategoryStat>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT pattern_type, created_by_engine, COUNT(*), SUM(avg_confidence)
             FROM patterns
             WHERE (?1 IS NULL OR created_at >= ?1)
             GROUP BY pattern_type, created_by_engine
             ORDER BY pattern_type ASC, COUNT(*) DESC, created_by_engine ASC",
        )
        .map_err(storage_err("category distribution"))?;

    let rows = stmt
        .query_map(params![since_param(since)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })
        .map_err(storage_err("category distribution"))?;

    // (count, confidence sum, top engine); rows arrive with each category's top engine first.
    let mut grouped: BTreeMap<PatternCategory, (u64, f64, Engine)> = BTreeMap::new();
    for row in rows {
        let (category, engine, count, confidence_sum) =
            row.map_err(storage_err("category distribution"))?;
        let category: PatternCategory = category
            .parse()
            .map_err(corrupt_column("patterns", "pattern_type"))?;
        let engine =
            Engine::new(engine).map_err(corrupt_column("patterns", "created_by_engine"))?;

        grouped
            .entry(category)
            .and_modify(|(n, sum, _)| {
                *n += count;
                *sum += confidence_sum;
            })
            .or_insert((count, confidence_sum, engine));
    }

    let mut stats: Vec<CategoryStat> = grouped
        .into_iter()
        .map(|(category, (count, sum, top_engine))| CategoryStat {
            category,
            count,
            avg_confidence: if count == 0 { 0.0 } else { sum / count as f64 },
            top_engine: Some(top_engine),
        })
        .collect();
    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
    Ok(stats)
}

/// Newest patterns first.
pub(crate) fn recent_patterns(
    conn: &Connection,
    limit: usize,
    filter: &StatsFilter,
) -> StoreResult<Vec<RecentPattern>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT p.id, c.external_id, p.pattern_type, p.created_by_engine,
                    p.avg_confidence, p.last_seen_page, p.created_at
             FROM patterns p
             JOIN cases c ON c.id = p.case_id
             WHERE (?1 IS NULL OR p.created_by_engine = ?1)
               AND (?2 IS NULL OR p.created_at >= ?2)
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT ?3",
        )
        .map_err(storage_err("recent patterns"))?;

    let rows = stmt
        .query_map(
            params![
                engine_param(filter),
                since_param(filter.since),
                i64::try_from(limit).unwrap_or(i64::MAX)
            ],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        )
        .map_err(storage_err("recent patterns"))?;

    let mut recent = Vec::new();
    for row in rows {
        let (id, case_external_id, category, engine, avg_confidence, last_seen_page, created_at) =
            row.map_err(storage_err("recent patterns"))?;
        recent.push(RecentPattern {
            pattern_id: id,
            case_external_id,
            category: category.parse().map_err(corrupt("patterns", id))?,
            engine: Engine::new(engine).map_err(corrupt("patterns", id))?,
            avg_confidence,
            last_seen_page,
            created_at: parse_timestamp("patterns", id, &created_at)?,
        });
    }
    Ok(recent)
}

pub(crate) fn divergence_stats(conn: &Connection) -> StoreResult<DivergenceStats> {
    let (total, avg_magnitude) = conn
        .query_row(
            "SELECT COUNT(*), COALESCE(AVG(ABS(expected_confidence - actual_confidence)), 0.0)
             FROM divergences",
            [],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, f64>(1)?)),
        )
        .map_err(storage_err("divergence stats"))?;

    let mut stmt = conn
        .prepare_cached("SELECT engine_used, COUNT(*) FROM divergences GROUP BY engine_used")
        .map_err(storage_err("divergence stats"))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))
        .map_err(storage_err("divergence stats"))?;

    let mut by_engine = BTreeMap::new();
    for row in rows {
        let (engine, count) = row.map_err(storage_err("divergence stats"))?;
        by_engine.insert(
            Engine::new(engine).map_err(corrupt_column("divergences", "engine_used"))?,
            count,
        );
    }

    Ok(DivergenceStats {
        total,
        by_engine,
        avg_magnitude,
    })
}

/// Newest cases first, each with its pattern count and mean confidence.
pub(crate) fn case_summaries(conn: &Connection, limit: usize) -> StoreResult<Vec<CaseSummary>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT c.id, c.external_id, c.origin, c.created_at,
                    COUNT(p.id), AVG(p.avg_confidence)
             FROM cases c
             LEFT JOIN patterns p ON p.case_id = c.id
             GROUP BY c.id
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT ?1",
        )
        .map_err(storage_err("case summaries"))?;

    let rows = stmt
        .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, u64>(4)?,
                row.get::<_, Option<f64>>(5)?,
            ))
        })
        .map_err(storage_err("case summaries"))?;

    let mut summaries = Vec::new();
    for row in rows {
        let (case_id, external_id, origin, created_at, pattern_count, avg_confidence) =
            row.map_err(storage_err("case summaries"))?;
        summaries.push(CaseSummary {
            case_id,
            external_id,
            origin,
            created_at: parse_timestamp("cases", case_id, &created_at)?,
            pattern_count,
            avg_confidence,
        });
    }
    Ok(summaries)
}
