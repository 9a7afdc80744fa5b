use alsrec::algorithms::AlternatingLeastSquares;
use alsrec::services::recommendation::RecommendationService;
use alsrec::{ingest, store, AppState, Config, Hyperparameters, RawInteraction, RecError};
use std::sync::Arc;

fn raw(records: &[(i64, i64, f64)]) -> Vec<RawInteraction> {
    records
        .iter()
        .map(|&(u, i, w)| RawInteraction::new(u, i, w))
        .collect()
}

fn params(factors: usize, iterations: usize, seed: u64) -> Hyperparameters {
    Hyperparameters {
        factors,
        regularization: 0.01,
        iterations,
        seed: Some(seed),
    }
}

#[test]
fn full_pipeline_ingest_train_store_serve() {
    let (matrix, summary) = ingest::accumulate(raw(&[
        (0, 0, 1.0),
        (0, 1, 2.0),
        (1, 1, 1.0),
        (1, 2, 3.0),
        (2, 0, 1.0),
        (2, 2, 1.0),
    ]));
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.n_users, 3);
    assert_eq!(summary.n_items, 3);

    let als = AlternatingLeastSquares::new(params(4, 5, 7)).unwrap();
    let model = als.fit(&matrix).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("als.bin");
    store::save(&model, &path).unwrap();
    let loaded = store::load(&path).unwrap();
    assert_eq!(loaded.user_factors, model.user_factors);
    assert_eq!(loaded.item_factors, model.item_factors);

    let service = RecommendationService::new(Arc::new(loaded));
    let recs = service.recommend_for_user(0, 2, true).unwrap();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].item_id, 2);

    let similar = service.similar_items(0, 2).unwrap();
    assert_eq!(similar.len(), 2);
    assert!(similar.iter().all(|r| r.item_id != 0));
}

#[test]
fn matrix_accumulation_sums_duplicate_pairs() {
    let (matrix, summary) = ingest::accumulate(raw(&[
        (0, 0, 1.0),
        (0, 0, 2.0),
        (0, 1, 1.0),
        (1, 0, 4.0),
    ]));

    // Three distinct pairs, four accepted records.
    assert_eq!(summary.accepted, 4);
    assert_eq!(matrix.nnz(), 3);
    assert_eq!(matrix.row(0), (&[0u32, 1][..], &[3.0f32, 1.0][..]));
}

#[test]
fn training_is_reproducible_with_a_fixed_seed() {
    let (matrix, _) = ingest::accumulate(raw(&[
        (0, 0, 1.0),
        (0, 2, 2.0),
        (1, 1, 1.0),
        (2, 0, 1.0),
        (2, 1, 5.0),
    ]));

    let als = AlternatingLeastSquares::new(params(8, 10, 1234)).unwrap();
    let first = als.fit(&matrix).unwrap();
    let second = als.fit(&matrix).unwrap();

    assert_eq!(first.user_factors, second.user_factors);
    assert_eq!(first.item_factors, second.item_factors);
}

#[test]
fn tiny_two_user_scenario_recommends_the_unseen_item() {
    // interactions = [(0,0,1.0), (0,1,1.0), (1,1,2.0)], f=2, iterations=5
    let (matrix, _) = ingest::accumulate(raw(&[(0, 0, 1.0), (0, 1, 1.0), (1, 1, 2.0)]));
    assert_eq!(matrix.n_items(), 2);

    let als = AlternatingLeastSquares::new(params(2, 5, 42)).unwrap();
    let service = RecommendationService::new(Arc::new(als.fit(&matrix).unwrap()));

    let recs = service.recommend_for_user(1, 1, true).unwrap();
    assert_eq!(recs.len(), 1);
    // Item 1 is already seen by user 1; item 0 is the only candidate.
    assert_eq!(recs[0].item_id, 0);
}

#[test]
fn out_of_range_queries_fail_with_typed_errors() {
    let (matrix, _) = ingest::accumulate(raw(&[(0, 0, 1.0), (1, 1, 1.0)]));
    let als = AlternatingLeastSquares::new(params(2, 3, 9)).unwrap();
    let service = RecommendationService::new(Arc::new(als.fit(&matrix).unwrap()));

    assert!(matches!(
        service.recommend_for_user(2, 3, true),
        Err(RecError::UnknownUser(2))
    ));
    assert!(matches!(
        service.similar_items(5, 3),
        Err(RecError::UnknownItem(5))
    ));
}

#[test]
fn store_failures_are_distinguishable() {
    let dir = tempfile::tempdir().unwrap();

    let missing = store::load(dir.path().join("nope.bin"));
    assert!(matches!(missing, Err(RecError::ModelNotFound(_))));

    let (matrix, _) = ingest::accumulate(raw(&[(0, 0, 1.0)]));
    let als = AlternatingLeastSquares::new(params(2, 2, 5)).unwrap();
    let model = als.fit(&matrix).unwrap();
    let path = dir.path().join("model.bin");
    store::save(&model, &path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 9]).unwrap();
    assert!(matches!(
        store::load(&path),
        Err(RecError::CorruptModel(_))
    ));
}

#[test]
fn reload_swaps_the_published_model_wholesale() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");

    let (matrix, _) = ingest::accumulate(raw(&[(0, 0, 1.0), (1, 1, 1.0)]));
    let als = AlternatingLeastSquares::new(params(2, 2, 3)).unwrap();
    store::save(&als.fit(&matrix).unwrap(), &path).unwrap();

    let mut config = Config::default();
    config.model.path = path.clone();
    let state = AppState::new(config).unwrap();
    assert_eq!(state.service().model().n_users(), 2);

    // Retrain on a wider interaction set and publish it.
    let (matrix, _) = ingest::accumulate(raw(&[(0, 0, 1.0), (1, 1, 1.0), (3, 2, 2.0)]));
    store::save(&als.fit(&matrix).unwrap(), &path).unwrap();
    state.reload().unwrap();

    let service = state.service();
    let model = service.model();
    assert_eq!(model.n_users(), 4);
    assert_eq!(model.n_items(), 3);
}

#[test]
fn server_startup_without_a_model_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.model.path = dir.path().join("untrained.bin");

    assert!(matches!(
        AppState::new(config),
        Err(RecError::ModelNotFound(_))
    ));
}
