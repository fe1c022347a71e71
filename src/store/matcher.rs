//! Linear-scan nearest match over stored signatures.

use std::cmp::Ordering;

use crate::model::{Hint, HintSource, Pattern};

/// Cosine similarity of two feature vectors.
///
/// Mismatched lengths, empty input, or a zero-norm side compare as `0.0`, never an error.
/// Accumulates in `f64` so near-identical 100-dim vectors still order correctly.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a_sq, norm_b_sq) =
        a.iter()
            .zip(b.iter())
            .fold((0.0f64, 0.0f64, 0.0f64), |(dot, na, nb), (&av, &bv)| {
                let (av, bv) = (f64::from(av), f64::from(bv));
                (dot + av * bv, na + av * av, nb + bv * bv)
            });

    let norm_a = norm_a_sq.sqrt();
    let norm_b = norm_b_sq.sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32
    }
}

/// A stored pattern paired with its similarity to a query.
#[derive(Debug, Clone)]
pub struct ScoredPattern {
    pub pattern: Pattern,
    pub similarity: f32,
}

impl ScoredPattern {
    /// `similarity * avg_confidence`, the per-match term used by global aggregation.
    #[inline]
    pub fn strength(&self) -> f64 {
        f64::from(self.similarity) * self.pattern.avg_confidence
    }

    pub fn into_hint(self, source: HintSource) -> Hint {
        let p = self.pattern;
        Hint {
            source,
            pattern_id: p.id,
            case_id: p.case_id,
            category: p.category,
            similarity: self.similarity,
            confidence: p.avg_confidence,
            suggested_engine: p.suggested_engine,
            suggested_bbox: p.suggested_bbox,
            created_by_engine: p.created_by_engine,
            occurrence_count: p.occurrence_count,
        }
    }
}

/// Ranks two matches: higher similarity, then more occurrences, then the older pattern.
pub(crate) fn rank(a: &ScoredPattern, b: &ScoredPattern) -> Ordering {
    a.similarity
        .total_cmp(&b.similarity)
        .then_with(|| a.pattern.occurrence_count.cmp(&b.pattern.occurrence_count))
        .then_with(|| b.pattern.id.cmp(&a.pattern.id))
}

/// Scores every candidate and keeps those at or above `threshold`.
pub fn matches_above<I>(query: &[f32], candidates: I, threshold: f32) -> Vec<ScoredPattern>
where
    I: IntoIterator<Item = Pattern>,
{
    candidates
        .into_iter()
        .filter_map(|pattern| {
            let similarity = cosine_similarity(query, pattern.signature.features());
            (similarity >= threshold).then_some(ScoredPattern {
                pattern,
                similarity,
            })
        })
        .collect()
}

/// Best match at or above `threshold`, with ties broken by [`rank`].
pub fn best_match<I>(query: &[f32], candidates: I, threshold: f32) -> Option<ScoredPattern>
where
    I: IntoIterator<Item = Pattern>,
{
    matches_above(query, candidates, threshold)
        .into_iter()
        .max_by(rank)
}
