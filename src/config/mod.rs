//! Environment-backed configuration.
//!
//! Every threshold the store decides with is named here. Defaults preserve the behaviour
//! the rest of the pipeline was tuned against; override with `PATTERN_STORE_*` variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_DEPRECATION_THRESHOLD, DEFAULT_DIVERGENCE_MAGNITUDE,
    DEFAULT_MIN_HINT_CONFIDENCE, DEFAULT_MIN_OCCURRENCES, DEFAULT_READ_POOL_SIZE,
    DEFAULT_SIMILARITY_THRESHOLD, MAX_READ_POOL_SIZE,
};

/// Store configuration loaded from environment variables.
///
/// Use [`StoreConfig::from_env`] to read `PATTERN_STORE_*` overrides on top of defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// SQLite database file. Default: `./.data/patterns.db`.
    pub db_path: PathBuf,

    /// Minimum cosine similarity for a match. Default: `0.85`.
    pub similarity_threshold: f32,

    /// Confidence gap that counts as a divergence. Default: `0.2`.
    pub divergence_magnitude: f64,

    /// Divergences before a pattern is deprecated. Default: `3`.
    pub deprecation_threshold: u32,

    /// Confidence a case-local hint needs to win outright. Default: `0.7`.
    pub min_hint_confidence: f64,

    /// Occurrences a pattern needs to join global aggregation. Default: `2`.
    pub default_min_occurrences: u32,

    /// SQLite busy timeout and connection lock bound. Default: `5s`.
    pub busy_timeout: Duration,

    /// Read connections for file-backed stores. Default: `4`.
    pub read_pool_size: usize,
}

/// Default database location used when `PATTERN_STORE_DB_PATH` is not set.
pub const DEFAULT_DB_PATH: &str = "./.data/patterns.db";

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            divergence_magnitude: DEFAULT_DIVERGENCE_MAGNITUDE,
            deprecation_threshold: DEFAULT_DEPRECATION_THRESHOLD,
            min_hint_confidence: DEFAULT_MIN_HINT_CONFIDENCE,
            default_min_occurrences: DEFAULT_MIN_OCCURRENCES,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            read_pool_size: DEFAULT_READ_POOL_SIZE,
        }
    }
}

impl StoreConfig {
    const ENV_DB_PATH: &'static str = "PATTERN_STORE_DB_PATH";
    const ENV_SIMILARITY_THRESHOLD: &'static str = "PATTERN_STORE_SIMILARITY_THRESHOLD";
    const ENV_DIVERGENCE_MAGNITUDE: &'static str = "PATTERN_STORE_DIVERGENCE_MAGNITUDE";
    const ENV_DEPRECATION_THRESHOLD: &'static str = "PATTERN_STORE_DEPRECATION_THRESHOLD";
    const ENV_MIN_HINT_CONFIDENCE: &'static str = "PATTERN_STORE_MIN_HINT_CONFIDENCE";
    const ENV_MIN_OCCURRENCES: &'static str = "PATTERN_STORE_MIN_OCCURRENCES";
    const ENV_BUSY_TIMEOUT_MS: &'static str = "PATTERN_STORE_BUSY_TIMEOUT_MS";
    const ENV_READ_POOL_SIZE: &'static str = "PATTERN_STORE_READ_POOL_SIZE";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            db_path: Self::parse_path_from_env(Self::ENV_DB_PATH, defaults.db_path),
            similarity_threshold: Self::parse_from_env(
                Self::ENV_SIMILARITY_THRESHOLD,
                defaults.similarity_threshold,
                "a number",
            )?,
            divergence_magnitude: Self::parse_from_env(
                Self::ENV_DIVERGENCE_MAGNITUDE,
                defaults.divergence_magnitude,
                "a number",
            )?,
            deprecation_threshold: Self::parse_from_env(
                Self::ENV_DEPRECATION_THRESHOLD,
                defaults.deprecation_threshold,
                "a positive integer",
            )?,
            min_hint_confidence: Self::parse_from_env(
                Self::ENV_MIN_HINT_CONFIDENCE,
                defaults.min_hint_confidence,
                "a number",
            )?,
            default_min_occurrences: Self::parse_from_env(
                Self::ENV_MIN_OCCURRENCES,
                defaults.default_min_occurrences,
                "a non-negative integer",
            )?,
            busy_timeout: Duration::from_millis(Self::parse_from_env(
                Self::ENV_BUSY_TIMEOUT_MS,
                DEFAULT_BUSY_TIMEOUT_MS,
                "milliseconds",
            )?),
            read_pool_size: Self::parse_from_env(
                Self::ENV_READ_POOL_SIZE,
                defaults.read_pool_size,
                "a positive integer",
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Returns a copy pointing at `db_path`.
    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }

    /// Checks ranges and that the database path is not a directory (does not create it).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_SIMILARITY_THRESHOLD,
                value: self.similarity_threshold.to_string(),
                reason: "must be within (0, 1]",
            });
        }
        if !(self.divergence_magnitude > 0.0 && self.divergence_magnitude < 1.0) {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_DIVERGENCE_MAGNITUDE,
                value: self.divergence_magnitude.to_string(),
                reason: "must be within (0, 1)",
            });
        }
        if self.deprecation_threshold == 0 {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_DEPRECATION_THRESHOLD,
                value: "0".to_string(),
                reason: "must be at least 1",
            });
        }
        if !(0.0..=1.0).contains(&self.min_hint_confidence) {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_MIN_HINT_CONFIDENCE,
                value: self.min_hint_confidence.to_string(),
                reason: "must be within [0, 1]",
            });
        }
        if self.busy_timeout.is_zero() {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_BUSY_TIMEOUT_MS,
                value: "0".to_string(),
                reason: "operations must carry a bounded, non-zero timeout",
            });
        }
        if self.read_pool_size == 0 || self.read_pool_size > MAX_READ_POOL_SIZE {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_READ_POOL_SIZE,
                value: self.read_pool_size.to_string(),
                reason: "must be within 1..=8",
            });
        }
        if self.db_path.is_dir() {
            return Err(ConfigError::NotAFile {
                path: self.db_path.clone(),
            });
        }
        Ok(())
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(default)
    }

    fn parse_from_env<T: FromStr>(
        var_name: &'static str,
        default: T,
        expected: &'static str,
    ) -> Result<T, ConfigError> {
        match env::var(var_name) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    name: var_name,
                    value,
                    expected,
                }),
            Err(_) => Ok(default),
        }
    }
}
