use alsrec::algorithms::AlternatingLeastSquares;
use alsrec::services::recommendation::RecommendationService;
use alsrec::{ingest, init_tracing, store, Hyperparameters, RawInteraction};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing().await;

    println!("alsrec basic usage walkthrough");

    // 1. Raw interaction events, including a couple of invalid rows that
    //    ingestion will skip rather than abort on.
    let events = vec![
        RawInteraction::new(0, 0, 1.0),
        RawInteraction::new(0, 1, 3.0),
        RawInteraction::new(0, 1, 1.0), // duplicate pair, weights sum
        RawInteraction::new(1, 1, 2.0),
        RawInteraction::new(1, 2, 1.0),
        RawInteraction::new(2, 0, 4.0),
        RawInteraction::new(2, 3, 1.0),
        RawInteraction::new(-1, 0, 1.0), // invalid id, skipped
        RawInteraction::new(3, 3, 0.0),  // non-positive weight, skipped
    ];

    // 2. Build the sparse interaction matrix.
    let (matrix, summary) = ingest::accumulate(events);
    println!(
        "ingested {} records ({} skipped) -> {} users x {} items, {} entries",
        summary.accepted,
        summary.skipped,
        summary.n_users,
        summary.n_items,
        matrix.nnz()
    );

    // 3. Train with a fixed seed so reruns produce the same factors.
    let als = AlternatingLeastSquares::new(Hyperparameters {
        factors: 8,
        regularization: 0.01,
        iterations: 10,
        seed: Some(42),
    })?;
    let model = als.fit(&matrix)?;
    println!(
        "trained {} factors per user/item at {}",
        model.factors(),
        model.trained_at
    );

    // 4. Persist and load back, as the server would at startup.
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("als.bin");
    store::save(&model, &path)?;
    let loaded = store::load(&path)?;

    // 5. Query the model.
    let service = RecommendationService::new(Arc::new(loaded));

    for user in 0..3u32 {
        let recs = service.recommend_for_user(user, 3, true)?;
        println!("top items for user {} (seen excluded):", user);
        for rec in recs {
            println!("  item {} score {:.4}", rec.item_id, rec.score);
        }
    }

    let similar = service.similar_items(1, 3)?;
    println!("items most similar to item 1:");
    for rec in similar {
        println!("  item {} similarity {:.4}", rec.item_id, rec.score);
    }

    Ok(())
}
