//! Pattern store library crate (used by the stats binary and integration tests).
//!
//! A learned, similarity-addressed cache that remembers which text-extraction engine
//! produced the best result for a page-layout signature and recommends an engine for
//! structurally similar pages later on.
//!
//! # Public API Surface
//!
//! ## Store
//! - [`PatternStore`] - durable store; `get_or_create_case`, `learn`, `find_similar`,
//!   `find_global_hint`, `best_engine_for_category`, `engine_stats`
//! - [`StoreError`], [`StoreResult`], [`Advisory`] - errors, and the "no hint on failure" adapter
//! - [`cosine_similarity`] - the similarity measure used for every lookup
//!
//! ## Signatures
//! - [`PageDescriptor`], [`compute`], [`infer_category`] - layout descriptor to signature
//! - [`SignatureVector`] - versioned, validated feature vector plus content hash
//!
//! ## Records
//! - [`Case`], [`Pattern`], [`Divergence`], [`Observation`], [`Hint`]
//! - [`EngineStat`], [`StoreSummary`] and friends for reporting
//!
//! ## Configuration
//! - [`StoreConfig`] - thresholds and storage settings (`PATTERN_STORE_*`)
//! - [`EngineQualityPolicy`] - injectable engine ranking

pub mod config;
pub mod constants;
pub mod hashing;
pub mod model;
pub mod quality;
pub mod signature;
pub mod store;

pub use config::{ConfigError, StoreConfig};
pub use hashing::hash_features;
pub use model::{
    BBox, Case, CaseSummary, CategoryStat, Divergence, DivergenceStats, Engine, EngineStat, Hint,
    HintSource, Observation, Pattern, PatternCategory, RecentPattern, StatsFilter, StoreSummary,
    ValidationError, ValidationResult,
};
pub use quality::EngineQualityPolicy;
pub use signature::{
    Complexity, PageDescriptor, PageKind, SignatureVector, compute, infer_category,
};
pub use store::{Advisory, PatternStore, StoreError, StoreResult, cosine_similarity};
