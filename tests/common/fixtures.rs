//! Test fixtures for integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use pattern_store::{
    BBox, Engine, EngineQualityPolicy, Observation, PatternCategory, PatternStore,
    SignatureVector, StoreConfig,
};
use tempfile::TempDir;

pub const FLAT: [f32; 5] = [0.5, 0.5, 0.5, 0.5, 0.5];

pub const NEAR_FLAT: [f32; 5] = [0.51, 0.49, 0.5, 0.5, 0.5];

/// Two-engine ranking used by most scenarios.
pub fn high_low_policy() -> EngineQualityPolicy {
    EngineQualityPolicy::from_pairs([("high", 1.0), ("low", 0.5)]).expect("valid policy")
}

/// File-backed store in a private temp directory (removed on drop).
pub struct TempStore {
    pub store: PatternStore,
    dir: TempDir,
}

impl TempStore {
    pub fn new(policy: EngineQualityPolicy) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PatternStore::open(Self::config_in(dir.path()), policy).expect("open store");
        Self { store, dir }
    }

    pub fn config_in(dir: &Path) -> StoreConfig {
        StoreConfig::default().with_db_path(dir.join("patterns.db"))
    }

    pub fn config(&self) -> StoreConfig {
        Self::config_in(self.dir.path())
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("patterns.db")
    }

    /// Opens a second handle on the same database, as another process would.
    pub fn reopen(&self, policy: EngineQualityPolicy) -> PatternStore {
        PatternStore::open(self.config(), policy).expect("reopen store")
    }

    /// Sets every pattern's occurrence count directly in SQLite.
    pub fn force_occurrence_count(&self, count: u32) {
        let conn = rusqlite::Connection::open(self.db_path()).expect("raw connection");
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .expect("busy timeout");
        conn.execute(
            "UPDATE patterns SET occurrence_count = ?1",
            rusqlite::params![count],
        )
        .expect("force occurrence count");
    }
}

pub fn signature(features: &[f32]) -> SignatureVector {
    SignatureVector::new(features.to_vec()).expect("valid signature")
}

pub fn engine(name: &str) -> Engine {
    Engine::new(name).expect("valid engine")
}

pub struct ObservationBuilder {
    page_num: u32,
    engine: String,
    confidence: f64,
    category: PatternCategory,
    bbox: Option<BBox>,
    text_length: u64,
}

impl ObservationBuilder {
    pub fn new(engine: &str, confidence: f64) -> Self {
        Self {
            page_num: 1,
            engine: engine.to_string(),
            confidence,
            category: PatternCategory::Unknown,
            bbox: None,
            text_length: 0,
        }
    }

    pub fn page(mut self, page_num: u32) -> Self {
        self.page_num = page_num;
        self
    }

    pub fn category(mut self, category: PatternCategory) -> Self {
        self.category = category;
        self
    }

    pub fn bbox(mut self, x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        self.bbox = Some(BBox::new(x0, y0, x1, y1).expect("valid bbox"));
        self
    }

    pub fn text_length(mut self, text_length: u64) -> Self {
        self.text_length = text_length;
        self
    }

    pub fn build(self) -> Observation {
        let mut observation = Observation::new(self.page_num, engine(&self.engine), self.confidence)
            .expect("valid observation")
            .with_category(self.category)
            .with_text_length(self.text_length);
        if let Some(bbox) = self.bbox {
            observation = observation.with_bbox(bbox);
        }
        observation
    }
}
