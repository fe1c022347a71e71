use serde::{Deserialize, Serialize};

use crate::constants::PAGE_WIDTH_PT;
use crate::model::{BBox, ValidationError, ValidationResult};

/// How the layout analyzer classified a page's text layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageKind {
    /// Embedded text layer, no OCR needed.
    Native,
    /// Scanned image, OCR required.
    RasterNeeded,
    /// Partial text layer over raster content.
    Mixed,
    Blank,
}

impl PageKind {
    #[inline]
    pub fn is_raster(&self) -> bool {
        matches!(self, PageKind::RasterNeeded | PageKind::Mixed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    NativeClean,
    NativeWithArtifacts,
    RasterClean,
    RasterDirty,
    #[default]
    Unknown,
}

impl Complexity {
    /// Ordinal position in `[0, 1]`, from cleanest to least known.
    pub fn ordinal(&self) -> f32 {
        match self {
            Complexity::NativeClean => 0.0,
            Complexity::NativeWithArtifacts => 0.25,
            Complexity::RasterClean => 0.5,
            Complexity::RasterDirty => 0.75,
            Complexity::Unknown => 1.0,
        }
    }
}

/// Layout-analyzer output for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDescriptor {
    /// 1-based page number.
    pub page_num: u32,
    pub page_kind: PageKind,
    /// Safe content area, in PDF points.
    pub bbox: Option<BBox>,
    /// Court/registry stamp along the page margin.
    #[serde(default)]
    pub has_stamp: bool,
    /// X coordinate where the stamp strip starts, in PDF points.
    #[serde(default)]
    pub stamp_x_cut: Option<f64>,
    pub char_count: u64,
    #[serde(default)]
    pub complexity: Complexity,
    /// Engine the analyzer would pick; informational only.
    #[serde(default)]
    pub recommended_engine: Option<String>,
}

impl PageDescriptor {
    pub fn new(page_num: u32, page_kind: PageKind) -> Self {
        Self {
            page_num,
            page_kind,
            bbox: None,
            has_stamp: false,
            stamp_x_cut: None,
            char_count: 0,
            complexity: Complexity::Unknown,
            recommended_engine: None,
        }
    }

    pub fn with_bbox(mut self, bbox: BBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_stamp(mut self, x_cut: Option<f64>) -> Self {
        self.has_stamp = true;
        self.stamp_x_cut = x_cut;
        self
    }

    pub fn with_char_count(mut self, char_count: u64) -> Self {
        self.char_count = char_count;
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_recommended_engine(mut self, engine: impl Into<String>) -> Self {
        self.recommended_engine = Some(engine.into());
        self
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if self.page_num == 0 {
            return Err(ValidationError::MalformedDescriptor {
                reason: "page numbers are 1-based".to_string(),
            });
        }
        if let Some(bbox) = &self.bbox {
            bbox.validate()
                .map_err(|e| ValidationError::MalformedDescriptor {
                    reason: e.to_string(),
                })?;
        }
        if let Some(cut) = self.stamp_x_cut
            && (!cut.is_finite() || !(0.0..=PAGE_WIDTH_PT).contains(&cut))
        {
            return Err(ValidationError::MalformedDescriptor {
                reason: format!("stamp cut {cut} lies outside the page"),
            });
        }
        Ok(())
    }
}
