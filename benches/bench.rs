//! Criterion benchmarks for the Xyston segment engine.
//!
//! Covers the hot paths:
//! - Two-phase insert throughput
//! - Brute-force search over raw committed rows
//! - Search through a built flat index

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use rand::Rng;

use xyston::collection::{Collection, CollectionConfig};
use xyston::query::{PlaceholderGroup, SearchPlan};
use xyston::schema::{FieldEntry, FieldType};
use xyston::segment::GrowingSegment;
use xyston::vector_index::{IndexConfig, IndexKind};

const DIM: usize = 64;
const BATCH: usize = 128;

fn collection(kind: IndexKind) -> Arc<Collection> {
    Arc::new(
        Collection::new(CollectionConfig {
            name: "bench".to_string(),
            fields: vec![
                FieldEntry::new("user_id", FieldType::Int64),
                FieldEntry::new("embedding", FieldType::FloatVector { dim: DIM }),
            ],
            index: IndexConfig {
                kind,
                ..Default::default()
            },
        })
        .unwrap(),
    )
}

/// Generate `count` rows with random vectors, encoded row-major.
fn generate_rows(count: usize) -> (Vec<i64>, Vec<u64>, Vec<u8>) {
    let mut rng = rand::rng();
    let mut raw = Vec::with_capacity(count * (8 + DIM * 4));
    let ids: Vec<i64> = (0..count as i64).collect();
    let timestamps = vec![1u64; count];
    for &id in &ids {
        raw.extend_from_slice(&id.to_le_bytes());
        for _ in 0..DIM {
            raw.extend_from_slice(&rng.random_range(-1.0f32..1.0).to_le_bytes());
        }
    }
    (ids, timestamps, raw)
}

fn populated_segment(rows: usize) -> GrowingSegment {
    let segment = GrowingSegment::new(collection(IndexKind::Flat), 1);
    let (ids, timestamps, raw) = generate_rows(rows);
    let offset = segment.pre_insert(rows as u64).unwrap();
    segment.insert(offset, &ids, &timestamps, &raw).unwrap();
    segment
}

fn random_query() -> Vec<f32> {
    let mut rng = rand::rng();
    (0..DIM).map(|_| rng.random_range(-1.0f32..1.0)).collect()
}

fn bench_insert(c: &mut Criterion) {
    let (ids, timestamps, raw) = generate_rows(BATCH);

    let mut group = c.benchmark_group("insert");
    group.throughput(Throughput::Elements(BATCH as u64));
    group.bench_function("reserve_and_commit_128", |b| {
        b.iter_batched_ref(
            || GrowingSegment::new(collection(IndexKind::Flat), 1),
            |segment| {
                let offset = segment.pre_insert(BATCH as u64).unwrap();
                segment
                    .insert(black_box(offset), &ids, &timestamps, &raw)
                    .unwrap();
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

fn bench_brute_force_search(c: &mut Criterion) {
    let segment = populated_segment(10_000);
    let plan = SearchPlan {
        field: "embedding".to_string(),
        metric: Default::default(),
        top_k: 10,
    };
    let group_query = PlaceholderGroup::new(DIM, random_query()).unwrap();

    let mut group = c.benchmark_group("search");
    group.throughput(Throughput::Elements(10_000));
    group.bench_function("brute_force_10k", |b| {
        b.iter(|| {
            let result = segment
                .search(&plan, &[&group_query], black_box(&[1]))
                .unwrap();
            black_box(result);
        });
    });
    group.finish();
}

fn bench_indexed_search(c: &mut Criterion) {
    let coll = collection(IndexKind::Flat);
    let segment = GrowingSegment::new(Arc::clone(&coll), 1);
    let (ids, timestamps, raw) = generate_rows(10_000);
    let offset = segment.pre_insert(10_000).unwrap();
    segment.insert(offset, &ids, &timestamps, &raw).unwrap();
    segment.close().unwrap();
    segment.build_index(&coll).unwrap();

    let plan = SearchPlan {
        field: "embedding".to_string(),
        metric: Default::default(),
        top_k: 10,
    };
    let group_query = PlaceholderGroup::new(DIM, random_query()).unwrap();

    let mut group = c.benchmark_group("search");
    group.throughput(Throughput::Elements(10_000));
    group.bench_function("flat_index_10k", |b| {
        b.iter(|| {
            let result = segment
                .search(&plan, &[&group_query], black_box(&[1]))
                .unwrap();
            black_box(result);
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_brute_force_search,
    bench_indexed_search
);
criterion_main!(benches);
