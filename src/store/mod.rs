//! Durable pattern store.
//!
//! [`PatternStore`] owns the monotonic-update and deprecation rules on top of SQLite.
//! Reads go through a small connection pool; every mutation runs in a `BEGIN IMMEDIATE`
//! transaction on the single writer, so check-then-insert sequences cannot interleave.
//!
//! ```no_run
//! use pattern_store::{EngineQualityPolicy, Observation, PatternStore, StoreConfig, SignatureVector};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PatternStore::open(StoreConfig::from_env()?, EngineQualityPolicy::default())?;
//! let case = store.get_or_create_case("0001234-56.2024.8.26.0100", "pje")?;
//!
//! let signature = SignatureVector::new(vec![0.5, 0.5, 0.5, 0.5])?;
//! let hint = store.find_global_hint(signature.features(), None, Some(case.id), None)?;
//!
//! let observation = Observation::new(1, "marker".parse()?, 0.93)?;
//! store.learn(case.id, &signature, &observation, hint.as_ref())?;
//! # Ok(())
//! # }
//! ```

pub mod advisory;
pub mod aggregate;
pub mod error;
pub mod matcher;
mod pool;
mod queries;
pub mod schema;


pub use advisory::Advisory;
pub use aggregate::{EngineGroup, occurrence_weight};
pub use error::{StoreError, StoreResult};
pub use matcher::{ScoredPattern, cosine_similarity};

use std::fs;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::StoreConfig;
use crate::model::{
    Case, CaseSummary, CategoryStat, Divergence, DivergenceStats, Engine, EngineStat, Hint,
    HintSource, Observation, Pattern, PatternCategory, RecentPattern, StatsFilter, StoreSummary,
    ValidationError, error::check_unit,
};
use crate::quality::EngineQualityPolicy;
use crate::signature::{SignatureVector, validate_features};

use pool::ConnectionPool;
use queries::divergences::NewDivergence;
use queries::patterns::{InsertOutcome, NewPattern};
use queries::{cases, divergences, patterns, stats};

/// Insert attempts before a unique-constraint race is reported.
const LEARN_ATTEMPTS: usize = 2;

/// Float noise allowed when comparing a confidence gap with the divergence magnitude.
///
/// `0.9 - 0.7` evaluates to `0.20000000000000007`; a gap equal to the magnitude is not a
/// divergence.
const GAP_TOLERANCE: f64 = 1e-9;

enum LearnOutcome {
    Created(i64),
    Updated {
        id: i64,
        occurrence_count: u32,
        avg_confidence: f64,
        diverged: bool,
        deprecated_now: bool,
    },
    Skipped {
        id: i64,
        stored_engine: Engine,
    },
    Conflict,
}

/// Handle to a pattern database. `Send + Sync`; share it behind an `Arc`.
pub struct PatternStore {
    pool: ConnectionPool,
    config: StoreConfig,
    policy: EngineQualityPolicy,
}

impl std::fmt::Debug for PatternStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternStore")
            .field("config", &self.config)
            .field("readers", &self.pool.reader_count())
            .finish_non_exhaustive()
    }
}

impl PatternStore {
    /// Opens (creating if needed) the database at `config.db_path` and migrates it.
    pub fn open(config: StoreConfig, policy: EngineQualityPolicy) -> StoreResult<Self> {
        config.validate()?;

        if let Some(parent) = config.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StoreError::StorageUnavailable {
                operation: "open database",
                reason: format!("cannot create {}: {e}", parent.display()),
            })?;
        }

        let mut pool = ConnectionPool::open(&config.db_path, config.busy_timeout)?;
        pool.with_writer("migrate", schema::migrate)?;
        pool.attach_readers(&config.db_path, config.read_pool_size)?;

        info!(
            path = %config.db_path.display(),
            readers = pool.reader_count(),
            "pattern store opened"
        );

        Ok(Self {
            pool,
            config,
            policy,
        })
    }

    /// Opens a private in-memory database with default thresholds.
    pub fn open_in_memory(policy: EngineQualityPolicy) -> StoreResult<Self> {
        Self::open_in_memory_with_config(StoreConfig::default(), policy)
    }

    /// In-memory database with custom thresholds; `db_path` and `read_pool_size` are ignored.
    pub fn open_in_memory_with_config(
        config: StoreConfig,
        policy: EngineQualityPolicy,
    ) -> StoreResult<Self> {
        StoreConfig {
            db_path: std::path::PathBuf::new(),
            ..config.clone()
        }
        .validate()?;

        let pool = ConnectionPool::open_in_memory(config.busy_timeout)?;
        pool.with_writer("migrate", schema::migrate)?;
        debug!("in-memory pattern store opened");

        Ok(Self {
            pool,
            config,
            policy,
        })
    }

    /// Flushes the WAL and closes every connection.
    pub fn close(self) -> StoreResult<()> {
        self.pool.close()?;
        info!("pattern store closed");
        Ok(())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn policy(&self) -> &EngineQualityPolicy {
        &self.policy
    }

    /// Returns the case for `external_id`, creating it on first reference.
    ///
    /// Idempotent: later calls return the stored case unchanged, whatever `origin` they pass.
    #[instrument(skip(self))]
    pub fn get_or_create_case(&self, external_id: &str, origin: &str) -> StoreResult<Case> {
        let external_id = external_id.trim();
        if external_id.is_empty() {
            return Err(ValidationError::EmptyField {
                field: "external_id",
            }
            .into());
        }
        if origin.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "origin" }.into());
        }

        let (case, created) = self.pool.with_writer("get_or_create_case", |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(error::storage_err("get_or_create_case"))?;
            let result = cases::get_or_create(&tx, external_id, origin.trim(), Utc::now())?;
            tx.commit()
                .map_err(error::storage_err("get_or_create_case"))?;
            Ok(result)
        })?;

        if created {
            info!(case_id = case.id, "case created");
        }
        Ok(case)
    }

    /// Records the outcome of processing a page and returns the pattern id.
    ///
    /// Creates the pattern on first sight of `(case_id, signature.hash())`. Otherwise the
    /// observation is applied only if its engine ranks at least as high as the one on record;
    /// a lower-ranked observation leaves the pattern untouched. When `hint` was followed and
    /// its confidence missed by more than the divergence magnitude, a divergence is recorded
    /// and the pattern is deprecated once the configured count is reached.
    #[instrument(
        skip(self, signature, observation, hint),
        fields(
            engine = %observation.engine_used,
            page = observation.page_num,
            hash = crate::hashing::short_hash(signature.hash()),
        )
    )]
    pub fn learn(
        &self,
        case_id: i64,
        signature: &SignatureVector,
        observation: &Observation,
        hint: Option<&Hint>,
    ) -> StoreResult<i64> {
        observation.validate()?;
        let quality = self.policy.require(&observation.engine_used)?;
        if let Some(hint) = hint {
            check_unit("hint confidence", hint.confidence)?;
        }

        let outcome = self.pool.with_writer("learn", |conn| {
            for attempt in 1..=LEARN_ATTEMPTS {
                match self.learn_once(conn, case_id, signature, observation, quality, hint)? {
                    LearnOutcome::Conflict => {
                        debug!(attempt, "concurrent insert won, retrying as update");
                    }
                    outcome => return Ok(outcome),
                }
            }
            Err(StoreError::ConsistencyViolation {
                reason: format!(
                    "pattern ({case_id}, {}) kept conflicting after {LEARN_ATTEMPTS} attempts",
                    signature.hash()
                ),
            })
        })?;

        Ok(match outcome {
            LearnOutcome::Created(id) => {
                info!(
                    pattern_id = id,
                    category = %observation.pattern_type,
                    confidence = observation.confidence,
                    "pattern created"
                );
                id
            }
            LearnOutcome::Updated {
                id,
                occurrence_count,
                avg_confidence,
                diverged,
                deprecated_now,
            } => {
                debug!(
                    pattern_id = id,
                    occurrence_count, avg_confidence, diverged, "pattern updated"
                );
                if deprecated_now {
                    warn!(
                        pattern_id = id,
                        threshold = self.config.deprecation_threshold,
                        "pattern deprecated after repeated divergence"
                    );
                }
                id
            }
            LearnOutcome::Skipped { id, stored_engine } => {
                debug!(
                    pattern_id = id,
                    stored_engine = %stored_engine,
                    "skipping update from lower-quality engine"
                );
                id
            }
            // learn_once never hands back a conflict outside the retry loop
            LearnOutcome::Conflict => {
                return Err(StoreError::ConsistencyViolation {
                    reason: "unresolved insert conflict".to_string(),
                });
            }
        })
    }

    fn learn_once(
        &self,
        conn: &mut Connection,
        case_id: i64,
        signature: &SignatureVector,
        observation: &Observation,
        quality: f64,
        hint: Option<&Hint>,
    ) -> StoreResult<LearnOutcome> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(error::storage_err("learn"))?;

        if !cases::exists(&tx, case_id)? {
            return Err(StoreError::UnknownCase { case_id });
        }

        let now = Utc::now();
        let outcome = match patterns::by_hash(&tx, case_id, signature.hash())? {
            None => {
                let new = NewPattern {
                    case_id,
                    category: observation.pattern_type,
                    signature,
                    page_num: observation.page_num,
                    engine: &observation.engine_used,
                    quality,
                    confidence: observation.confidence,
                    bbox: observation.bbox.as_ref(),
                    now,
                };
                match patterns::insert(&tx, &new)? {
                    InsertOutcome::Inserted(id) => LearnOutcome::Created(id),
                    // dropping tx rolls back
                    InsertOutcome::Conflict => return Ok(LearnOutcome::Conflict),
                }
            }
            Some(stored) => self.apply_observation(&tx, stored, observation, quality, hint, now)?,
        };

        tx.commit().map_err(error::storage_err("learn"))?;
        Ok(outcome)
    }

    fn apply_observation(
        &self,
        conn: &Connection,
        stored: Pattern,
        observation: &Observation,
        quality: f64,
        hint: Option<&Hint>,
        now: DateTime<Utc>,
    ) -> StoreResult<LearnOutcome> {
        if !self.accepts(&stored, &observation.engine_used) {
            return Ok(LearnOutcome::Skipped {
                id: stored.id,
                stored_engine: stored.created_by_engine,
            });
        }

        let mut pattern = stored;
        let seen = f64::from(pattern.occurrence_count);
        pattern.avg_confidence =
            ((pattern.avg_confidence * seen + observation.confidence) / (seen + 1.0)).clamp(0.0, 1.0);
        pattern.occurrence_count = pattern.occurrence_count.saturating_add(1);
        pattern.last_seen_page = observation.page_num;
        pattern.suggested_engine = observation.engine_used.clone();
        if quality > pattern.engine_quality_score {
            pattern.created_by_engine = observation.engine_used.clone();
            pattern.engine_quality_score = quality;
        }
        if let Some(bbox) = observation.bbox {
            pattern.suggested_bbox = Some(bbox);
        }

        let mut diverged = false;
        if let Some(hint) = hint {
            let gap = (hint.confidence - observation.confidence).abs();
            if gap - self.config.divergence_magnitude > GAP_TOLERANCE {
                divergences::insert(
                    conn,
                    &NewDivergence {
                        pattern_id: pattern.id,
                        page_num: observation.page_num,
                        expected_confidence: hint.confidence,
                        actual_confidence: observation.confidence,
                        engine_used: &observation.engine_used,
                        recorded_at: now,
                    },
                )?;
                pattern.divergence_count = pattern.divergence_count.saturating_add(1);
                diverged = true;
                warn!(
                    pattern_id = pattern.id,
                    expected = hint.confidence,
                    actual = observation.confidence,
                    divergence_count = pattern.divergence_count,
                    "hint diverged from observed confidence"
                );
            }
        }

        let deprecated_now =
            !pattern.deprecated && pattern.divergence_count >= self.config.deprecation_threshold;
        if deprecated_now {
            pattern.deprecated = true;
        }
        pattern.updated_at = now;

        patterns::update(conn, &pattern)?;

        Ok(LearnOutcome::Updated {
            id: pattern.id,
            occurrence_count: pattern.occurrence_count,
            avg_confidence: pattern.avg_confidence,
            diverged,
            deprecated_now,
        })
    }

    /// Monotonicity rule: the observing engine must rank at or above the engine on record.
    ///
    /// An engine the current policy no longer ranks is judged by its stored score.
    fn accepts(&self, stored: &Pattern, engine: &Engine) -> bool {
        if self.policy.is_ranked(&stored.created_by_engine) {
            self.policy
                .at_least_as_good(engine, &stored.created_by_engine)
        } else {
            self.policy.quality(engine) >= stored.engine_quality_score
        }
    }

    /// Whether `learn` would apply `observation` to the pattern; `false` for unknown ids.
    pub fn should_update_pattern(
        &self,
        pattern_id: i64,
        observation: &Observation,
    ) -> StoreResult<bool> {
        observation.validate()?;
        Ok(self
            .pattern(pattern_id)?
            .is_some_and(|stored| self.accepts(&stored, &observation.engine_used)))
    }

    /// Best live pattern of `case_id` at or above the similarity threshold.
    ///
    /// Equal similarities prefer the pattern seen more often.
    #[instrument(skip(self, vector), fields(dim = vector.len()))]
    pub fn find_similar(
        &self,
        case_id: i64,
        vector: &[f32],
        category: Option<PatternCategory>,
    ) -> StoreResult<Option<Hint>> {
        validate_features(vector)?;

        let candidates = self.pool.with_reader("find_similar", |conn| {
            patterns::active_in_case(conn, case_id, category)
        })?;
        let scanned = candidates.len();

        let best = matcher::best_match(vector, candidates, self.config.similarity_threshold);
        debug!(
            scanned,
            similarity = best.as_ref().map(|m| m.similarity),
            "case scan complete"
        );
        Ok(best.map(|m| m.into_hint(HintSource::Local)))
    }

    /// Recommendation drawing on every case.
    ///
    /// A usable hint from `prefer_case_id` wins outright. Otherwise live patterns seen at least
    /// `min_occurrences` times (default from config) are matched, grouped by creating engine,
    /// and the best match of the highest-scoring group is returned.
    #[instrument(skip(self, vector), fields(dim = vector.len()))]
    pub fn find_global_hint(
        &self,
        vector: &[f32],
        category: Option<PatternCategory>,
        prefer_case_id: Option<i64>,
        min_occurrences: Option<u32>,
    ) -> StoreResult<Option<Hint>> {
        validate_features(vector)?;

        if let Some(case_id) = prefer_case_id
            && let Some(local) = self.find_similar(case_id, vector, category)?
            && local.confidence >= self.config.min_hint_confidence
        {
            debug!(pattern_id = local.pattern_id, "case-local hint takes precedence");
            return Ok(Some(local));
        }

        let min_occurrences = min_occurrences.unwrap_or(self.config.default_min_occurrences);
        let candidates = self.pool.with_reader("find_global_hint", |conn| {
            patterns::active_global(conn, category, min_occurrences)
        })?;
        let scanned = candidates.len();

        let matches =
            matcher::matches_above(vector, candidates, self.config.similarity_threshold);
        let group = aggregate::best_group(matches);
        debug!(
            scanned,
            engine = group.as_ref().map(|g| g.engine.as_str()),
            score = group.as_ref().map(|g| g.score),
            "global scan complete"
        );
        Ok(group.map(EngineGroup::into_hint))
    }

    /// Engine with the best mean confidence (then most occurrences) on live patterns of `category`.
    pub fn best_engine_for_category(
        &self,
        category: PatternCategory,
    ) -> StoreResult<Option<Engine>> {
        self.pool.with_reader("best_engine_for_category", |conn| {
            patterns::best_engine_for_category(conn, category)
        })
    }

    /// `true` when `hint` clears the configured similarity threshold and minimum confidence.
    pub fn is_usable(&self, hint: &Hint) -> bool {
        hint.should_use(
            self.config.similarity_threshold,
            self.config.min_hint_confidence,
        )
    }

    pub fn pattern(&self, pattern_id: i64) -> StoreResult<Option<Pattern>> {
        self.pool
            .with_reader("pattern", |conn| patterns::get(conn, pattern_id))
    }

    pub fn divergences(&self, pattern_id: i64) -> StoreResult<Vec<Divergence>> {
        self.pool.with_reader("divergences", |conn| {
            divergences::for_pattern(conn, pattern_id)
        })
    }

    pub fn pattern_count(&self, case_id: i64, deprecated: bool) -> StoreResult<u64> {
        self.pool.with_reader("pattern_count", |conn| {
            patterns::count(conn, case_id, deprecated)
        })
    }

    pub fn engine_stats(&self) -> StoreResult<Vec<EngineStat>> {
        self.engine_stats_filtered(&StatsFilter::default())
    }

    pub fn engine_stats_filtered(&self, filter: &StatsFilter) -> StoreResult<Vec<EngineStat>> {
        self.pool
            .with_reader("engine_stats", |conn| stats::engine_stats(conn, filter))
    }

    pub fn summary(&self) -> StoreResult<StoreSummary> {
        self.pool.with_reader("summary", stats::summary)
    }

    pub fn category_distribution(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<CategoryStat>> {
        self.pool.with_reader("category_distribution", |conn| {
            stats::category_distribution(conn, since)
        })
    }

    pub fn recent_patterns(
        &self,
        limit: usize,
        filter: &StatsFilter,
    ) -> StoreResult<Vec<RecentPattern>> {
        self.pool.with_reader("recent_patterns", |conn| {
            stats::recent_patterns(conn, limit, filter)
        })
    }

    pub fn divergence_stats(&self) -> StoreResult<DivergenceStats> {
        self.pool
            .with_reader("divergence_stats", stats::divergence_stats)
    }

    pub fn case_summaries(&self, limit: usize) -> StoreResult<Vec<CaseSummary>> {
        self.pool
            .with_reader("case_summaries", |conn| stats::case_summaries(conn, limit))
    }
}
