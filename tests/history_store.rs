// tests/history_store.rs
//
// Round-trip and concurrency checks against both history backends.

use std::collections::HashSet;
use std::sync::Arc;

use lambda_f_engine::history::{recent_or_empty, trend};
use lambda_f_engine::{
    compute_score, Collection, FileStore, HistoryStore, MemoryStore, Observation,
    ObservationSet, Order, ScoreResult, SharedStore,
};

fn sample(sentiment: f64) -> ScoreResult {
    let set: ObservationSet = vec![
        Observation::new("Inflation", sentiment, 120).unwrap(),
        Observation::new("Jobs", 0.1, 80).unwrap(),
    ]
    .into_iter()
    .collect();
    compute_score(&set)
}

async fn round_trip(store: &dyn HistoryStore) {
    let result = sample(0.45);
    let saved = store.append(&result, true).await.expect("append");

    let got = store
        .list_recent(Collection::Simulations, 1, Order::Desc)
        .await
        .expect("list_recent");
    assert_eq!(got.len(), 1);
    let back = &got[0];
    assert_eq!(back.lambda_f, result.lambda_f());
    assert_eq!(back.tier, result.tier());
    assert_eq!(back.source_details, saved.source_details);
    assert!(back.is_simulated);
}

async fn concurrent_appends_are_all_kept(store: SharedStore) {
    let mut handles = Vec::new();
    for i in 0..32 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let s = (i as f64 / 32.0) - 0.5;
            store.append(&sample(s), false).await.expect("append")
        }));
    }
    let mut ids = HashSet::new();
    for h in handles {
        ids.insert(h.await.expect("join").id);
    }
    assert_eq!(ids.len(), 32, "ids must be unique");

    let all = store
        .list_recent(Collection::Scores, 100, Order::Asc)
        .await
        .expect("list_recent");
    assert_eq!(all.len(), 32);
    assert!(all.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert!(all.iter().all(|r| ids.contains(&r.id)));
}

#[tokio::test]
async fn memory_round_trip() {
    round_trip(&MemoryStore::new()).await;
}

#[tokio::test]
async fn file_round_trip_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileStore::open(tmp.path()).await.unwrap();
    round_trip(&store).await;
    drop(store);

    let reopened = FileStore::open(tmp.path()).await.unwrap();
    let got = reopened
        .list_recent(Collection::Simulations, 10, Order::Desc)
        .await
        .unwrap();
    assert_eq!(got.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_concurrent_appends() {
    concurrent_appends_are_all_kept(Arc::new(MemoryStore::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn file_concurrent_appends() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileStore::open(tmp.path()).await.unwrap();
    concurrent_appends_are_all_kept(Arc::new(store)).await;
}

#[tokio::test]
async fn limit_and_order_are_honoured() {
    let store = MemoryStore::new();
    for s in [-0.4, 0.0, 0.4] {
        store.append(&sample(s), false).await.unwrap();
    }
    let desc = store
        .list_recent(Collection::Scores, 2, Order::Desc)
        .await
        .unwrap();
    assert_eq!(desc.len(), 2);
    assert!(desc[0].timestamp >= desc[1].timestamp);

    let none = store
        .list_recent(Collection::Scores, 0, Order::Desc)
        .await
        .unwrap();
    assert!(none.is_empty());

    let empty = store
        .list_recent(Collection::Simulations, 10, Order::Desc)
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn unreadable_store_degrades_to_no_history() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileStore::open(tmp.path()).await.unwrap();
    // A directory where the collection file should be makes reads fail.
    std::fs::create_dir(store.path_for(Collection::Scores)).unwrap();

    assert!(store
        .list_recent(Collection::Scores, 5, Order::Desc)
        .await
        .is_err());
    let (records, available) = recent_or_empty(&store, Collection::Scores, 5, Order::Desc).await;
    assert!(records.is_empty());
    assert!(!available);

    let points = trend(&records);
    assert!(points.is_empty());
}
