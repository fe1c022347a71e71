use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Engine, PatternCategory};

/// Per-engine aggregate over every pattern the engine created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStat {
    pub engine: Engine,
    pub total_patterns: u64,
    pub avg_confidence: f64,
    pub total_occurrences: u64,
    pub active_count: u64,
    pub deprecated_count: u64,
}

impl EngineStat {
    /// `(total - deprecated) / total`, or `0.0` for an engine with no patterns.
    pub fn reliability(&self) -> f64 {
        if self.total_patterns == 0 {
            return 0.0;
        }
        (self.total_patterns - self.deprecated_count) as f64 / self.total_patterns as f64
    }
}

/// Optional narrowing for statistics queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsFilter {
    pub engine: Option<Engine>,
    /// Only patterns created at or after this instant.
    pub since: Option<DateTime<Utc>>,
}

impl StatsFilter {
    pub fn engine(mut self, engine: Engine) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub total_cases: u64,
    pub total_patterns: u64,
    pub active_patterns: u64,
    pub deprecated_patterns: u64,
    pub total_divergences: u64,
    pub total_occurrences: u64,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStat {
    pub category: PatternCategory,
    pub count: u64,
    pub avg_confidence: f64,
    /// Engine that created the most patterns of this category.
    pub top_engine: Option<Engine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentPattern {
    pub pattern_id: i64,
    pub case_external_id: String,
    pub category: PatternCategory,
    pub engine: Engine,
    pub avg_confidence: f64,
    pub last_seen_page: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DivergenceStats {
    pub total: u64,
    pub by_engine: BTreeMap<Engine, u64>,
    pub avg_magnitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSummary {
    pub case_id: i64,
    pub external_id: String,
    pub origin: String,
    pub created_at: DateTime<Utc>,
    pub pattern_count: u64,
    pub avg_confidence: Option<f64>,
}
