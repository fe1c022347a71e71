use tracing::debug;

use super::descriptor::{PageDescriptor, PageKind};
use super::vector::SignatureVector;
use crate::constants::{CHAR_COUNT_SATURATION, PAGE_HEIGHT_PT, PAGE_WIDTH_PT, SIGNATURE_V1_DIM};
use crate::hashing::short_hash;
use crate::model::{BBox, PatternCategory, ValidationResult};

/// Band (fraction of page height) at the top/bottom where headers/footers live.
const MARGIN_BAND: f64 = 0.20;
/// Maximum height (fraction of page) of a header/footer box.
const MARGIN_BOX_MAX_HEIGHT: f64 = 0.15;
/// Characters per square inch above which native text reads as tabular.
const TABLE_DENSITY: f64 = 30.0;
/// Minimum width (fraction of page) of a table box.
const TABLE_MIN_WIDTH: f64 = 0.6;

const FULL_PAGE: BBox = BBox {
    x0: 0.0,
    y0: 0.0,
    x1: PAGE_WIDTH_PT,
    y1: PAGE_HEIGHT_PT,
};

#[inline]
fn unit(value: f64) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0) as f32
    } else {
        0.0
    }
}

/// Turns a page descriptor into a version-1 signature (14 features in `[0, 1]`).
///
/// Deterministic: the same descriptor always yields the same features and hash.
pub fn compute(descriptor: &PageDescriptor) -> ValidationResult<SignatureVector> {
    descriptor.validate()?;

    let bbox = descriptor.bbox.unwrap_or(FULL_PAGE);
    let mut features = Vec::with_capacity(SIGNATURE_V1_DIM);

    let kinds = [
        PageKind::Native,
        PageKind::RasterNeeded,
        PageKind::Mixed,
        PageKind::Blank,
    ];
    features.extend(
        kinds
            .iter()
            .map(|k| if *k == descriptor.page_kind { 1.0 } else { 0.0 }),
    );

    features.push(unit(bbox.x0 / PAGE_WIDTH_PT));
    features.push(unit(bbox.y0 / PAGE_HEIGHT_PT));
    features.push(unit(bbox.x1 / PAGE_WIDTH_PT));
    features.push(unit(bbox.y1 / PAGE_HEIGHT_PT));

    features.push(if descriptor.has_stamp { 1.0 } else { 0.0 });
    features.push(
        descriptor
            .stamp_x_cut
            .map(|cut| unit(cut / PAGE_WIDTH_PT))
            .unwrap_or(0.0),
    );

    let density = (1.0 + descriptor.char_count as f64).ln() / (1.0 + CHAR_COUNT_SATURATION).ln();
    features.push(unit(density));
    features.push(descriptor.complexity.ordinal());

    let (w, h) = (bbox.width(), bbox.height());
    features.push(if w + h > 0.0 { unit(w / (w + h)) } else { 0.0 });
    features.push(unit(bbox.area() / (PAGE_WIDTH_PT * PAGE_HEIGHT_PT)));

    debug_assert_eq!(features.len(), SIGNATURE_V1_DIM);

    let signature = SignatureVector::new(features)?;
    debug!(
        page_num = descriptor.page_num,
        hash = short_hash(signature.hash()),
        "Computed page signature"
    );
    Ok(signature)
}

/// Heuristic closed-set classification of the page's dominant structure.
pub fn infer_category(descriptor: &PageDescriptor) -> ValidationResult<PatternCategory> {
    descriptor.validate()?;

    if descriptor.page_kind == PageKind::Blank {
        return Ok(PatternCategory::Unknown);
    }
    if descriptor.has_stamp && descriptor.page_kind.is_raster() {
        return Ok(PatternCategory::SignatureStamp);
    }

    if let Some(bbox) = descriptor.bbox {
        let height_frac = bbox.height() / PAGE_HEIGHT_PT;
        if height_frac <= MARGIN_BOX_MAX_HEIGHT {
            if bbox.y1 <= PAGE_HEIGHT_PT * MARGIN_BAND {
                return Ok(PatternCategory::Header);
            }
            if bbox.y0 >= PAGE_HEIGHT_PT * (1.0 - MARGIN_BAND) {
                return Ok(PatternCategory::Footer);
            }
        }
    }

    if descriptor.page_kind == PageKind::RasterNeeded && descriptor.char_count == 0 {
        return Ok(PatternCategory::Image);
    }

    let bbox = descriptor.bbox.unwrap_or(FULL_PAGE);
    let square_inches = bbox.area() / (72.0 * 72.0);
    if descriptor.page_kind == PageKind::Native
        && square_inches > 0.0
        && descriptor.char_count as f64 / square_inches >= TABLE_DENSITY
        && bbox.width() / PAGE_WIDTH_PT >= TABLE_MIN_WIDTH
    {
        return Ok(PatternCategory::Table);
    }

    Ok(PatternCategory::TextBlock)
}
