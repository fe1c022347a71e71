use super::*;
use crate::model::{BBox, PatternCategory, ValidationError};
use crate::store::matcher::cosine_similarity;

fn bbox(x0: f64, y0: f64, x1: f64, y1: f64) -> BBox {
    BBox::new(x0, y0, x1, y1).expect("valid bbox")
}

fn native_body(char_count: u64) -> PageDescriptor {
    PageDescriptor::new(1, PageKind::Native)
        .with_bbox(bbox(50.0, 50.0, 550.0, 750.0))
        .with_char_count(char_count)
        .with_complexity(Complexity::NativeClean)
}

#[test]
fn test_signature_rejects_empty_and_oversized() {
    assert_eq!(
        SignatureVector::new(vec![]),
        Err(ValidationError::EmptyVector)
    );
    assert_eq!(
        SignatureVector::new(vec![0.1; 101]),
        Err(ValidationError::VectorTooLong { len: 101, max: 100 })
    );
    assert!(SignatureVector::new(vec![0.1; 100]).is_ok());
}

#[test]
fn test_signature_rejects_non_finite_features() {
    assert_eq!(
        SignatureVector::new(vec![0.1, f32::INFINITY]),
        Err(ValidationError::NonFiniteFeature { index: 1 })
    );
}

#[test]
fn test_signature_with_hash_keeps_external_hash() {
    let sig = SignatureVector::with_hash(vec![0.1, 0.2, 0.3], "abc").expect("valid");
    assert_eq!(sig.hash(), "abc");
    assert_eq!(sig.features(), &[0.1, 0.2, 0.3]);
    assert!(SignatureVector::with_hash(vec![0.1], "  ").is_err());
}

#[test]
fn test_signature_blob_preserves_features_exactly() {
    let sig = SignatureVector::new(vec![0.123_456_7, 1.0, 0.0, 0.5]).expect("valid");
    let decoded = SignatureVector::from_blob(&sig.to_blob(), sig.hash()).expect("decodes");
    assert_eq!(decoded, sig);
}

#[test]
fn test_signature_blob_rejects_foreign_versions_and_truncation() {
    let sig = SignatureVector::new(vec![0.5, 0.5]).expect("valid");
    let mut blob = sig.to_blob();

    blob[0] = 9;
    assert_eq!(
        SignatureVector::from_blob(&blob, "h"),
        Err(ValidationError::UnsupportedVersion { version: 9 })
    );

    let truncated = &sig.to_blob()[..6];
    assert!(matches!(
        SignatureVector::from_blob(truncated, "h"),
        Err(ValidationError::MalformedBlob { .. })
    ));
    assert!(matches!(
        SignatureVector::from_blob(&[], "h"),
        Err(ValidationError::MalformedBlob { .. })
    ));
}

#[test]
fn test_signature_deserialize_enforces_invariants() {
    let bad = r#"{"version":1,"features":[],"hash":"abc"}"#;
    assert!(serde_json::from_str::<SignatureVector>(bad).is_err());

    let good = r#"{"version":1,"features":[0.5,0.25],"hash":"abc"}"#;
    let sig: SignatureVector = serde_json::from_str(good).expect("valid json");
    assert_eq!(sig.dim(), 2);
}

#[test]
fn test_compute_is_deterministic() {
    let descriptor = native_body(2000);
    let a = compute(&descriptor).expect("valid descriptor");
    let b = compute(&descriptor).expect("valid descriptor");
    assert_eq!(a, b);
    assert_eq!(a.dim(), crate::constants::SIGNATURE_V1_DIM);
}

#[test]
fn test_compute_features_are_unit_bounded() {
    let descriptors = [
        native_body(0),
        native_body(1_000_000),
        PageDescriptor::new(3, PageKind::RasterNeeded).with_stamp(Some(540.0)),
        PageDescriptor::new(4, PageKind::Blank),
    ];
    for descriptor in &descriptors {
        let sig = compute(descriptor).expect("valid descriptor");
        assert!(
            sig.features().iter().all(|f| (0.0..=1.0).contains(f)),
            "features out of range: {:?}",
            sig.features()
        );
    }
}

#[test]
fn test_compute_separates_page_kinds() {
    let native = compute(&native_body(2000)).expect("valid");
    let raster = compute(
        &PageDescriptor::new(1, PageKind::RasterNeeded)
            .with_bbox(bbox(50.0, 50.0, 550.0, 750.0))
            .with_complexity(Complexity::RasterDirty),
    )
    .expect("valid");

    assert_ne!(native.hash(), raster.hash());
    assert!(cosine_similarity(native.features(), raster.features()) < 0.85);
}

#[test]
fn test_compute_keeps_near_duplicates_similar() {
    let a = compute(&native_body(2000)).expect("valid");
    let b = compute(
        &PageDescriptor::new(7, PageKind::Native)
            .with_bbox(bbox(55.0, 45.0, 545.0, 755.0))
            .with_char_count(1900)
            .with_complexity(Complexity::NativeClean),
    )
    .expect("valid");

    assert_ne!(a.hash(), b.hash());
    assert!(cosine_similarity(a.features(), b.features()) >= 0.85);
}

#[test]
fn test_compute_ignores_page_number_and_engine() {
    let a = compute(&native_body(2000)).expect("valid");
    let mut other = native_body(2000).with_recommended_engine("marker");
    other.page_num = 42;
    let b = compute(&other).expect("valid");
    assert_eq!(a.hash(), b.hash());
}

#[test]
fn test_compute_rejects_malformed_descriptors() {
    let zero_page = PageDescriptor::new(0, PageKind::Native);
    assert!(matches!(
        compute(&zero_page),
        Err(ValidationError::MalformedDescriptor { .. })
    ));

    let off_page_stamp = PageDescriptor::new(1, PageKind::RasterNeeded).with_stamp(Some(700.0));
    assert!(matches!(
        compute(&off_page_stamp),
        Err(ValidationError::MalformedDescriptor { .. })
    ));

    let mut inverted = PageDescriptor::new(1, PageKind::Native);
    inverted.bbox = Some(BBox {
        x0: 500.0,
        y0: 0.0,
        x1: 100.0,
        y1: 10.0,
    });
    assert!(compute(&inverted).is_err());
    assert!(infer_category(&inverted).is_err());
}

#[test]
fn test_infer_category_margins() {
    let header = PageDescriptor::new(1, PageKind::Native)
        .with_bbox(bbox(50.0, 20.0, 560.0, 100.0))
        .with_char_count(120);
    assert_eq!(infer_category(&header), Ok(PatternCategory::Header));

    let footer = PageDescriptor::new(1, PageKind::Native)
        .with_bbox(bbox(50.0, 700.0, 560.0, 770.0))
        .with_char_count(40);
    assert_eq!(infer_category(&footer), Ok(PatternCategory::Footer));
}

#[test]
fn test_infer_category_body_content() {
    assert_eq!(infer_category(&native_body(3000)), Ok(PatternCategory::Table));
    assert_eq!(
        infer_category(&native_body(1500)),
        Ok(PatternCategory::TextBlock)
    );

    let scanned = PageDescriptor::new(1, PageKind::RasterNeeded)
        .with_bbox(bbox(50.0, 50.0, 550.0, 750.0));
    assert_eq!(infer_category(&scanned), Ok(PatternCategory::Image));

    let stamped = PageDescriptor::new(1, PageKind::RasterNeeded).with_stamp(Some(540.0));
    assert_eq!(
        infer_category(&stamped),
        Ok(PatternCategory::SignatureStamp)
    );

    let blank = PageDescriptor::new(1, PageKind::Blank);
    assert_eq!(infer_category(&blank), Ok(PatternCategory::Unknown));
}
