//! Records exchanged with the orchestrator and persisted by the store.

pub mod error;
pub mod stats;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::{ValidationError, ValidationResult};
pub use stats::{
    CaseSummary, CategoryStat, DivergenceStats, EngineStat, RecentPattern, StatsFilter,
    StoreSummary,
};
pub use types::{
    BBox, Case, Divergence, Engine, Hint, HintSource, Observation, Pattern, PatternCategory,
};
