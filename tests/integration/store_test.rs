//! Bulk load and host-driven changes against the in-memory store.

use marker_sync::interfaces::EntityStore;
use marker_sync::storage::MemoryEntityStore;
use marker_sync::test_utils::{insert_record, ts};
use marker_sync::{Classification, DispatchOutcome, MarkerRow, Persist, Position};

use crate::common::{Harness, STREAM, TABLE};

fn row(id: &str, classification: Classification, secs: i64, x: f64) -> MarkerRow {
    MarkerRow::new(id, classification, ts(secs), Position::new(x, 0.0, 0.0))
}

#[tokio::test]
async fn test_load_static_then_replay_dynamic() {
    let h = Harness::with_store(MemoryEntityStore::with_rows(vec![
        row("pin", Classification::Static, 100, 1.0),
        row("truck", Classification::Dynamic, 100, 1.0),
    ]));
    h.feed.add_stream(TABLE, STREAM).await;
    h.feed
        .add_closed_shard(
            STREAM,
            "shardId-00000001",
            vec![vec![
                insert_record("pin", "500", Some("static"), (9.0, 9.0, 9.0), 500),
                insert_record("truck", "200", Some("dynamic"), (2.0, 0.0, 0.0), 200),
            ]],
        )
        .await;

    let loaded = h.consumer.load_all(true).await.unwrap();
    assert_eq!(loaded.created, 1);
    assert!(!h.registry.contains("truck").await);

    h.consumer.replay(TABLE, ts(0)).await;

    let pin = h.registry.lookup("pin").await.unwrap();
    assert_eq!(pin.origin.position, Position::new(1.0, 0.0, 0.0));
    let truck = h.registry.lookup("truck").await.unwrap();
    assert_eq!(truck.history().unwrap().len(), 1);
    assert_eq!(h.store.len().await, 2);
}

#[tokio::test]
async fn test_user_created_marker_lifecycle() {
    let h = Harness::new();
    let dispatcher = h.consumer.dispatcher();

    let created = dispatcher
        .create(row("flag", Classification::Temporary, 100, 4.0), Persist::Store)
        .await
        .unwrap();
    assert_eq!(created, DispatchOutcome::Created);
    assert_eq!(h.store.scan().await.unwrap().len(), 1);

    let again = dispatcher
        .create(row("flag", Classification::Temporary, 200, 5.0), Persist::Store)
        .await
        .unwrap();
    assert_eq!(again, DispatchOutcome::Dropped);
    assert_eq!(h.store.len().await, 1);

    let removed = dispatcher.remove("flag", true).await.unwrap();
    assert!(removed.is_some());
    assert!(h.store.is_empty().await);
    assert!(!h.registry.contains("flag").await);
}

#[tokio::test]
async fn test_refresh_latest_follows_store() {
    let h = Harness::with_store(MemoryEntityStore::with_rows(vec![row(
        "truck",
        Classification::Dynamic,
        100,
        1.0,
    )]));
    h.consumer.load_all(false).await.unwrap();

    h.store
        .put(&row("truck", Classification::Dynamic, 400, 4.0))
        .await
        .unwrap();
    let refreshed = h.consumer.dispatcher().refresh_latest("truck").await.unwrap();

    assert_eq!(refreshed.map(|l| l.sort_key), Some("400".to_string()));
    assert_eq!(
        h.registry.lookup("truck").await.unwrap().latest().position,
        Position::new(4.0, 0.0, 0.0)
    );
}

#[tokio::test]
async fn test_remove_if_selected_markers() {
    let h = Harness::with_store(MemoryEntityStore::with_rows(vec![
        row("a", Classification::Temporary, 100, 1.0),
        row("b", Classification::Temporary, 100, 1.0),
        row("c", Classification::Static, 100, 1.0),
    ]));
    h.consumer.load_all(false).await.unwrap();

    let removed = h
        .registry
        .remove_if(|entity| entity.classification == Classification::Temporary)
        .await;

    assert_eq!(removed.len(), 2);
    let remaining: Vec<_> = h
        .registry
        .entities()
        .await
        .into_iter()
        .map(|e| e.entity_id)
        .collect();
    assert_eq!(remaining, vec!["c"]);
}
