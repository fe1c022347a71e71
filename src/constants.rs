//! Cross-cutting, shared constants.
//!
//! These are the defaults behind [`StoreConfig`](crate::config::StoreConfig). Code that
//! makes a decision should read the configured value, not the constant.

/// Minimum cosine similarity for two signatures to count as the same layout family.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.85;

/// `|expected - actual|` confidence gap above which a hint is recorded as diverged.
pub const DEFAULT_DIVERGENCE_MAGNITUDE: f64 = 0.2;

/// Divergences after which a pattern is deprecated.
pub const DEFAULT_DEPRECATION_THRESHOLD: u32 = 3;

/// Minimum confidence for a case-local hint to short-circuit the global search.
pub const DEFAULT_MIN_HINT_CONFIDENCE: f64 = 0.7;

/// Minimum occurrences for a pattern to take part in global aggregation.
pub const DEFAULT_MIN_OCCURRENCES: u32 = 2;

/// Default SQLite busy timeout and lock-acquisition bound.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_READ_POOL_SIZE: usize = 4;
pub const MAX_READ_POOL_SIZE: usize = 8;

/// Upper bound on signature length (features).
pub const MAX_SIGNATURE_DIM: usize = 100;

/// Current on-disk signature encoding.
pub const SIGNATURE_VERSION: u8 = 1;

/// Number of features produced by [`compute`](crate::signature::compute) for version 1.
pub const SIGNATURE_V1_DIM: usize = 14;

/// Reference page size (US letter, PDF points) used to normalise coordinates.
pub const PAGE_WIDTH_PT: f64 = 612.0;
pub const PAGE_HEIGHT_PT: f64 = 792.0;

/// Character count that saturates the density feature.
pub const CHAR_COUNT_SATURATION: f64 = 10_000.0;
