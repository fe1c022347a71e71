//! Engine quality ranking.
//!
//! [`EngineQualityPolicy`] is plain data: a map from engine to a score in `(0, 1]`, fixed at
//! construction. The store's monotonic-update rule only ever asks it two questions, so any
//! ranking can be swapped in without touching store logic.

use std::collections::HashMap;
use std::env;

use crate::model::{Engine, ValidationError, ValidationResult};

/// Environment variable holding an `engine=score,engine=score` ranking.
pub const ENV_ENGINE_QUALITY: &str = "PATTERN_STORE_ENGINE_QUALITY";

/// Built-in ranking: layout-aware OCR first, native text extraction, then plain OCR.
pub const DEFAULT_RANKING: [(&str, f64); 3] =
    [("marker", 1.0), ("pdfplumber", 0.9), ("tesseract", 0.7)];

#[derive(Debug, Clone, PartialEq)]
pub struct EngineQualityPolicy {
    scores: HashMap<Engine, f64>,
}

impl Default for EngineQualityPolicy {
    fn default() -> Self {
        let scores = DEFAULT_RANKING
            .iter()
            .map(|(name, score)| (Engine(name.to_string()), *score))
            .collect();
        Self { scores }
    }
}

impl EngineQualityPolicy {
    /// Builds a policy from `(engine, score)` pairs; later duplicates win.
    pub fn from_pairs<I, E>(pairs: I) -> ValidationResult<Self>
    where
        I: IntoIterator<Item = (E, f64)>,
        E: Into<String>,
    {
        let mut scores = HashMap::new();
        for (name, score) in pairs {
            let engine = Engine::new(name)?;
            if !score.is_finite() || score <= 0.0 || score > 1.0 {
                return Err(ValidationError::QualityOutOfRange {
                    engine: engine.to_string(),
                    value: score,
                });
            }
            scores.insert(engine, score);
        }
        if scores.is_empty() {
            return Err(ValidationError::EmptyField {
                field: "engine quality policy",
            });
        }
        Ok(Self { scores })
    }

    /// Parses `marker=1.0,tesseract=0.7` (whitespace tolerant).
    pub fn parse(spec: &str) -> ValidationResult<Self> {
        let mut pairs = Vec::new();
        for item in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (name, score) =
                item.split_once('=')
                    .ok_or_else(|| ValidationError::MalformedPolicy {
                        reason: format!("expected engine=score, got '{item}'"),
                    })?;
            let score: f64 = score
                .trim()
                .parse()
                .map_err(|_| ValidationError::MalformedPolicy {
                    reason: format!("score for '{}' is not a number", name.trim()),
                })?;
            pairs.push((name.trim().to_string(), score));
        }
        Self::from_pairs(pairs)
    }

    /// Reads [`ENV_ENGINE_QUALITY`], falling back to the built-in ranking when unset.
    pub fn from_env() -> ValidationResult<Self> {
        match env::var(ENV_ENGINE_QUALITY) {
            Ok(spec) if !spec.trim().is_empty() => Self::parse(&spec),
            _ => Ok(Self::default()),
        }
    }

    /// Score of `engine`, or `None` when the policy does not rank it.
    #[inline]
    pub fn get(&self, engine: &Engine) -> Option<f64> {
        self.scores.get(engine).copied()
    }

    /// Score of `engine`; unranked engines score `0.0` and so never outrank a ranked one.
    #[inline]
    pub fn quality(&self, engine: &Engine) -> f64 {
        self.get(engine).unwrap_or(0.0)
    }

    /// Score of a ranked engine, or a validation error.
    pub fn require(&self, engine: &Engine) -> ValidationResult<f64> {
        self.get(engine)
            .ok_or_else(|| ValidationError::UnrankedEngine {
                engine: engine.to_string(),
            })
    }

    /// `true` when `a` ranks at or above `b`.
    #[inline]
    pub fn at_least_as_good(&self, a: &Engine, b: &Engine) -> bool {
        self.quality(a) >= self.quality(b)
    }

    pub fn is_ranked(&self, engine: &Engine) -> bool {
        self.scores.contains_key(engine)
    }

    /// Engines ordered best first (ties by name).
    pub fn ranking(&self) -> Vec<(Engine, f64)> {
        let mut ranking: Vec<_> = self.scores.iter().map(|(e, s)| (e.clone(), *s)).collect();
        ranking.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranking
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn engine(name: &str) -> Engine {
        Engine::new(name).expect("valid engine")
    }

    #[test]
    fn test_default_ranking() {
        let policy = EngineQualityPolicy::default();
        assert_eq!(policy.quality(&engine("marker")), 1.0);
        assert_eq!(policy.quality(&engine("pdfplumber")), 0.9);
        assert_eq!(policy.quality(&engine("tesseract")), 0.7);
    }

    #[test]
    fn test_at_least_as_good_is_a_total_order_on_scores() {
        let policy = EngineQualityPolicy::default();
        let (m, p, t) = (engine("marker"), engine("pdfplumber"), engine("tesseract"));

        assert!(policy.at_least_as_good(&m, &t));
        assert!(!policy.at_least_as_good(&t, &m));
        assert!(policy.at_least_as_good(&p, &p));
        assert!(policy.at_least_as_good(&m, &p) && policy.at_least_as_good(&p, &t));
    }

    #[test]
    fn test_unranked_engines_never_outrank_ranked_ones() {
        let policy = EngineQualityPolicy::default();
        let unknown = engine("mystery-ocr");

        assert_eq!(policy.quality(&unknown), 0.0);
        assert!(!policy.at_least_as_good(&unknown, &engine("tesseract")));
        assert!(matches!(
            policy.require(&unknown),
            Err(ValidationError::UnrankedEngine { .. })
        ));
    }

    #[test]
    fn test_swapped_policy_inverts_decisions() {
        let inverted =
            EngineQualityPolicy::from_pairs([("marker", 0.2), ("tesseract", 1.0)]).expect("valid");
        assert!(inverted.at_least_as_good(&engine("tesseract"), &engine("marker")));
        assert!(!inverted.at_least_as_good(&engine("marker"), &engine("tesseract")));
    }

    #[test]
    fn test_from_pairs_rejects_out_of_range_scores() {
        for bad in [0.0, -0.5, 1.01, f64::NAN] {
            assert!(matches!(
                EngineQualityPolicy::from_pairs([("marker", bad)]),
                Err(ValidationError::QualityOutOfRange { .. })
            ));
        }
        assert!(EngineQualityPolicy::from_pairs(Vec::<(String, f64)>::new()).is_err());
    }

    #[test]
    fn test_parse() {
        let policy = EngineQualityPolicy::parse(" high = 1.0 , low=0.3,").expect("valid");
        assert_eq!(policy.quality(&engine("high")), 1.0);
        assert_eq!(policy.quality(&engine("low")), 0.3);

        assert!(matches!(
            EngineQualityPolicy::parse("high"),
            Err(ValidationError::MalformedPolicy { .. })
        ));
        assert!(matches!(
            EngineQualityPolicy::parse("high=fast"),
            Err(ValidationError::MalformedPolicy { .. })
        ));
    }

    #[test]
    fn test_ranking_is_best_first() {
        let names: Vec<_> = EngineQualityPolicy::default()
            .ranking()
            .into_iter()
            .map(|(e, _)| e.to_string())
            .collect();
        assert_eq!(names, ["marker", "pdfplumber", "tesseract"]);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        // SAFETY: Test code only, serialized with other env-mutating tests.
        unsafe { env::set_var(ENV_ENGINE_QUALITY, "fast=0.5,slow=1.0") };
        let policy = EngineQualityPolicy::from_env().expect("valid env policy");
        // SAFETY: Test code only.
        unsafe { env::remove_var(ENV_ENGINE_QUALITY) };

        assert_eq!(policy.quality(&engine("slow")), 1.0);
        assert!(!policy.is_ranked(&engine("marker")));

        let fallback = EngineQualityPolicy::from_env().expect("defaults");
        assert_eq!(fallback, EngineQualityPolicy::default());
    }
}
