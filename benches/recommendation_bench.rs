use alsrec::algorithms::AlternatingLeastSquares;
use alsrec::services::recommendation::RecommendationService;
use alsrec::{ingest, Hyperparameters, RawInteraction};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn synthetic_records(n_users: i64, n_items: i64, per_user: i64) -> Vec<RawInteraction> {
    let mut records = Vec::new();
    for user in 0..n_users {
        for j in 0..per_user {
            // Spread interactions deterministically over the item space.
            let item = (user * 31 + j * 17) % n_items;
            let weight = 1.0 + (j % 5) as f64;
            records.push(RawInteraction::new(user, item, weight));
        }
    }
    records
}

fn benchmark_ingestion(c: &mut Criterion) {
    let records = synthetic_records(500, 200, 20);

    c.bench_function("ingest_accumulate", |b| {
        b.iter(|| {
            black_box(ingest::accumulate(records.clone()));
        });
    });
}

fn benchmark_training(c: &mut Criterion) {
    let (matrix, _) = ingest::accumulate(synthetic_records(200, 100, 10));
    let als = AlternatingLeastSquares::new(Hyperparameters {
        factors: 32,
        regularization: 0.01,
        iterations: 3,
        seed: Some(1),
    })
    .unwrap();

    c.bench_function("als_fit", |b| {
        b.iter(|| {
            black_box(als.fit(&matrix).unwrap());
        });
    });
}

fn benchmark_queries(c: &mut Criterion) {
    let (matrix, _) = ingest::accumulate(synthetic_records(500, 1000, 25));
    let als = AlternatingLeastSquares::new(Hyperparameters {
        factors: 64,
        regularization: 0.01,
        iterations: 2,
        seed: Some(2),
    })
    .unwrap();
    let service = RecommendationService::new(Arc::new(als.fit(&matrix).unwrap()));

    c.bench_function("recommend_for_user", |b| {
        b.iter(|| {
            black_box(service.recommend_for_user(42, 10, true).unwrap());
        });
    });

    c.bench_function("similar_items", |b| {
        b.iter(|| {
            black_box(service.similar_items(7, 10).unwrap());
        });
    });
}

criterion_group!(
    benches,
    benchmark_ingestion,
    benchmark_training,
    benchmark_queries
);
criterion_main!(benches);
