use super::*;

fn engine(name: &str) -> Engine {
    Engine::new(name).expect("valid engine")
}

#[test]
fn test_engine_rejects_blank_names() {
    assert_eq!(
        Engine::new("   "),
        Err(ValidationError::EmptyField { field: "engine" })
    );
    assert_eq!(engine(" marker ").as_str(), "marker");
}

#[test]
fn test_category_round_trips_through_storage_name() {
    for category in PatternCategory::ALL {
        let parsed: PatternCategory = category.as_str().parse().expect("known name");
        assert_eq!(parsed, category);
    }
    assert_eq!(
        "Text-Block".parse::<PatternCategory>(),
        Ok(PatternCategory::TextBlock)
    );
    assert!(matches!(
        "letterhead".parse::<PatternCategory>(),
        Err(ValidationError::UnknownCategory { .. })
    ));
}

#[test]
fn test_bbox_rejects_inverted_and_non_finite() {
    assert!(BBox::new(0.0, 0.0, 10.0, 10.0).is_ok());
    assert!(matches!(
        BBox::new(10.0, 0.0, 0.0, 10.0),
        Err(ValidationError::InvalidBBox { .. })
    ));
    assert!(matches!(
        BBox::new(0.0, f64::NAN, 10.0, 10.0),
        Err(ValidationError::InvalidBBox { .. })
    ));
}

#[test]
fn test_observation_confidence_bounds() {
    assert!(Observation::new(1, engine("marker"), 0.9).is_ok());
    assert!(Observation::new(1, engine("marker"), 0.0).is_ok());
    assert!(Observation::new(1, engine("marker"), 1.0).is_ok());

    assert!(matches!(
        Observation::new(1, engine("marker"), 1.5),
        Err(ValidationError::ConfidenceOutOfRange { .. })
    ));
    assert!(matches!(
        Observation::new(1, engine("marker"), -0.1),
        Err(ValidationError::ConfidenceOutOfRange { .. })
    ));
    assert!(matches!(
        Observation::new(1, engine("marker"), f64::NAN),
        Err(ValidationError::ConfidenceOutOfRange { .. })
    ));
}

#[test]
fn test_observation_validate_catches_mutated_fields() {
    let mut observation = Observation::new(1, engine("marker"), 0.9).expect("valid");
    observation.confidence = 2.0;
    assert!(observation.validate().is_err());
}

fn hint(similarity: f32, confidence: f64) -> Hint {
    Hint {
        source: HintSource::Local,
        pattern_id: 1,
        case_id: 1,
        category: PatternCategory::Header,
        similarity,
        confidence,
        suggested_engine: engine("marker"),
        suggested_bbox: None,
        created_by_engine: engine("marker"),
        occurrence_count: 1,
    }
}

#[test]
fn test_hint_should_use() {
    assert!(hint(0.9, 0.85).should_use(0.85, 0.7));
    assert!(!hint(0.5, 0.85).should_use(0.85, 0.7));
    assert!(!hint(0.9, 0.5).should_use(0.85, 0.7));
}

#[test]
fn test_engine_stat_reliability() {
    let stat = EngineStat {
        engine: engine("tesseract"),
        total_patterns: 4,
        avg_confidence: 0.7,
        total_occurrences: 10,
        active_count: 3,
        deprecated_count: 1,
    };
    assert!((stat.reliability() - 0.75).abs() < 1e-12);

    let empty = EngineStat {
        total_patterns: 0,
        deprecated_count: 0,
        active_count: 0,
        ..stat
    };
    assert_eq!(empty.reliability(), 0.0);
}

#[test]
fn test_hint_serializes_with_snake_case_enums() {
    let json = serde_json::to_value(hint(0.9, 0.8)).expect("serializable");
    assert_eq!(json["source"], "local");
    assert_eq!(json["category"], "header");
    assert_eq!(json["suggested_engine"], "marker");
}
