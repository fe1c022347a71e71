use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ValidationError, ValidationResult, check_unit};
use crate::signature::SignatureVector;

/// Identifier of an external text-extraction backend (e.g. `marker`, `tesseract`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Engine(pub(crate) String);

impl Engine {
    /// Creates an engine id; rejects blank names.
    pub fn new(name: impl Into<String>) -> ValidationResult<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyField { field: "engine" });
        }
        Ok(Self(trimmed.to_string()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Engine {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Closed set of structural pattern categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    Header,
    Footer,
    Table,
    TextBlock,
    Image,
    SignatureStamp,
    Unknown,
}

impl PatternCategory {
    pub const ALL: [PatternCategory; 7] = [
        PatternCategory::Header,
        PatternCategory::Footer,
        PatternCategory::Table,
        PatternCategory::TextBlock,
        PatternCategory::Image,
        PatternCategory::SignatureStamp,
        PatternCategory::Unknown,
    ];

    /// Stable storage/wire name.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternCategory::Header => "header",
            PatternCategory::Footer => "footer",
            PatternCategory::Table => "table",
            PatternCategory::TextBlock => "text_block",
            PatternCategory::Image => "image",
            PatternCategory::SignatureStamp => "signature_stamp",
            PatternCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownCategory {
                value: s.to_string(),
            })
    }
}

/// Axis-aligned bounding box in PDF points (`x0,y0` top-left, `x1,y1` bottom-right).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> ValidationResult<Self> {
        let bbox = Self { x0, y0, x1, y1 };
        bbox.validate()?;
        Ok(bbox)
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if ![self.x0, self.y0, self.x1, self.y1]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ValidationError::InvalidBBox {
                reason: "coordinates must be finite".to_string(),
            });
        }
        if self.x1 < self.x0 || self.y1 < self.y0 {
            return Err(ValidationError::InvalidBBox {
                reason: format!(
                    "inverted box ({}, {}, {}, {})",
                    self.x0, self.y0, self.x1, self.y1
                ),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
}

/// One real-world document/matter. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: i64,
    pub external_id: String,
    pub origin: String,
    pub created_at: DateTime<Utc>,
}

/// Learned `(case, signature) -> engine/confidence` association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: i64,
    pub case_id: i64,
    pub category: PatternCategory,
    pub signature: SignatureVector,
    pub first_seen_page: u32,
    pub last_seen_page: u32,
    pub created_by_engine: Engine,
    pub engine_quality_score: f64,
    pub avg_confidence: f64,
    pub suggested_bbox: Option<BBox>,
    pub suggested_engine: Engine,
    pub occurrence_count: u32,
    pub divergence_count: u32,
    pub deprecated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pattern {
    /// `true` while the pattern can still produce hints.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.deprecated
    }
}

/// A hint whose promised confidence did not hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub id: i64,
    pub pattern_id: i64,
    pub page_num: u32,
    pub expected_confidence: f64,
    pub actual_confidence: f64,
    pub engine_used: Engine,
    pub recorded_at: DateTime<Utc>,
}

impl Divergence {
    #[inline]
    pub fn magnitude(&self) -> f64 {
        (self.expected_confidence - self.actual_confidence).abs()
    }
}

/// Outcome reported by an extraction engine after processing a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub page_num: u32,
    pub engine_used: Engine,
    pub confidence: f64,
    pub text_length: u64,
    pub pattern_type: PatternCategory,
    pub bbox: Option<BBox>,
    /// Engine's own success flag, carried for callers only; learning ignores it.
    pub success: bool,
}

impl Observation {
    /// Creates a successful observation of an uncategorised pattern.
    pub fn new(page_num: u32, engine_used: Engine, confidence: f64) -> ValidationResult<Self> {
        let observation = Self {
            page_num,
            engine_used,
            confidence,
            text_length: 0,
            pattern_type: PatternCategory::Unknown,
            bbox: None,
            success: true,
        };
        observation.validate()?;
        Ok(observation)
    }

    pub fn with_category(mut self, category: PatternCategory) -> Self {
        self.pattern_type = category;
        self
    }

    pub fn with_text_length(mut self, text_length: u64) -> Self {
        self.text_length = text_length;
        self
    }

    pub fn with_bbox(mut self, bbox: BBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn validate(&self) -> ValidationResult<()> {
        check_unit("confidence", self.confidence)?;
        if let Some(bbox) = &self.bbox {
            bbox.validate()?;
        }
        Ok(())
    }
}

/// Where a hint's evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintSource {
    /// A pattern of the queried case.
    Local,
    /// Engine-grouped evidence aggregated across cases.
    Global,
}

/// Advisory recommendation returned before a page is processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hint {
    pub source: HintSource,
    /// Pattern the hint was built from (the best match of the winning group for global hints).
    pub pattern_id: i64,
    pub case_id: i64,
    pub category: PatternCategory,
    pub similarity: f32,
    pub confidence: f64,
    pub suggested_engine: Engine,
    pub suggested_bbox: Option<BBox>,
    pub created_by_engine: Engine,
    /// Occurrences behind the hint (summed over the engine group for global hints).
    pub occurrence_count: u32,
}

impl Hint {
    /// Returns `true` when both similarity and confidence clear the given bounds.
    pub fn should_use(&self, min_similarity: f32, min_confidence: f64) -> bool {
        self.similarity >= min_similarity && self.confidence >= min_confidence
    }

    #[inline]
    pub fn is_local(&self) -> bool {
        self.source == HintSource::Local
    }
}
