use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use pattern_store::{
    EngineQualityPolicy, Observation, PatternCategory, PatternStore, SignatureVector,
    cosine_similarity,
};

/// Deterministic pseudo-random vector in `[0, 1)`.
fn vector(seed: u64, dim: usize) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..dim)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 40) as f32 / (1u64 << 24) as f32
        })
        .collect()
}

/// 50 cases x 20 patterns, every pattern seen five times.
fn populated_store() -> PatternStore {
    let store = PatternStore::open_in_memory(EngineQualityPolicy::default()).unwrap();
    let engines = ["marker", "pdfplumber", "tesseract"];

    for case_idx in 0..50u64 {
        let case = store
            .get_or_create_case(&format!("case-{case_idx}"), "bench")
            .unwrap();
        for pattern_idx in 0..20u64 {
            let signature =
                SignatureVector::new(vector(case_idx * 100 + pattern_idx, 14)).unwrap();
            let engine = engines[(pattern_idx % 3) as usize].parse().unwrap();
            let observation = Observation::new(1, engine, 0.9)
                .unwrap()
                .with_category(PatternCategory::TextBlock);
            for _ in 0..5 {
                store.learn(case.id, &signature, &observation, None).unwrap();
            }
        }
    }
    store
}

fn bench_cosine(c: &mut Criterion) {
    let (a14, b14) = (vector(1, 14), vector(2, 14));
    let (a100, b100) = (vector(3, 100), vector(4, 100));

    c.bench_function("cosine_similarity_14d", |b| {
        b.iter(|| cosine_similarity(black_box(&a14), black_box(&b14)));
    });
    c.bench_function("cosine_similarity_100d", |b| {
        b.iter(|| cosine_similarity(black_box(&a100), black_box(&b100)));
    });
}

fn bench_lookups(c: &mut Criterion) {
    let store = populated_store();
    let query = vector(7, 14);
    let case = store.get_or_create_case("case-7", "bench").unwrap();

    c.bench_function("find_similar_20_patterns", |b| {
        b.iter(|| {
            store
                .find_similar(case.id, black_box(&query), None)
                .unwrap()
        });
    });

    c.bench_function("find_global_hint_1k_patterns", |b| {
        b.iter(|| {
            store
                .find_global_hint(black_box(&query), Some(PatternCategory::TextBlock), None, None)
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_cosine, bench_lookups);
criterion_main!(benches);
