//! Cross-case, engine-grouped scoring for global hints.
//!
//! Each engine's surviving matches are scored as `Σ(sim · conf · w) / Σ(w)` with
//! `w = 1 + occurrences / 10`.

use std::collections::BTreeMap;

use crate::model::{Engine, Hint, HintSource};

use super::matcher::ScoredPattern;

/// Weight of one match in its engine group.
#[inline]
pub fn occurrence_weight(occurrence_count: u32) -> f64 {
    1.0 + f64::from(occurrence_count) / 10.0
}

/// All threshold-passing matches created by one engine.
#[derive(Debug, Clone)]
pub struct EngineGroup {
    pub engine: Engine,
    pub score: f64,
    pub total_occurrences: u32,
    /// Strongest single match (`similarity * confidence`) in the group.
    pub best: ScoredPattern,
}

impl EngineGroup {
    fn from_matches(engine: Engine, matches: Vec<ScoredPattern>) -> Option<Self> {
        let (weighted, weights) = matches.iter().fold((0.0, 0.0), |(num, den), m| {
            let w = occurrence_weight(m.pattern.occurrence_count);
            (num + m.strength() * w, den + w)
        });
        let total_occurrences = matches
            .iter()
            .fold(0u32, |acc, m| acc.saturating_add(m.pattern.occurrence_count));

        let best = matches.into_iter().max_by(|a, b| {
            a.strength()
                .total_cmp(&b.strength())
                .then_with(|| a.pattern.occurrence_count.cmp(&b.pattern.occurrence_count))
                .then_with(|| b.pattern.id.cmp(&a.pattern.id))
        })?;

        Some(Self {
            engine,
            score: if weights > 0.0 { weighted / weights } else { 0.0 },
            total_occurrences,
            best,
        })
    }

    /// Global hint carrying the best match's suggestion and the group's total occurrences.
    pub fn into_hint(self) -> Hint {
        let occurrences = self.total_occurrences;
        let mut hint = self.best.into_hint(HintSource::Global);
        hint.occurrence_count = occurrences;
        hint
    }
}

/// Groups matches by creating engine; output is ordered by engine name.
pub fn group_by_engine(matches: Vec<ScoredPattern>) -> Vec<EngineGroup> {
    let mut by_engine: BTreeMap<Engine, Vec<ScoredPattern>> = BTreeMap::new();
    for m in matches {
        by_engine
            .entry(m.pattern.created_by_engine.clone())
            .or_default()
            .push(m);
    }

    by_engine
        .into_iter()
        .filter_map(|(engine, matches)| EngineGroup::from_matches(engine, matches))
        .collect()
}

/// Highest-scoring group; ties go to more total occurrences, then to the engine name.
pub fn best_group(matches: Vec<ScoredPattern>) -> Option<EngineGroup> {
    group_by_engine(matches).into_iter().max_by(|a, b| {
        a.score
            .total_cmp(&b.score)
            .then_with(|| a.total_occurrences.cmp(&b.total_occurrences))
            .then_with(|| b.engine.cmp(&a.engine))
    })
}
