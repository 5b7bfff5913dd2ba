//! Replay scenarios against a scripted feed.

use marker_sync::interfaces::{FeedRecord, OperationType};
use marker_sync::test_utils::{insert_record, marker_image, record_with_image, ts};
use marker_sync::{Classification, Position};

use crate::common::{Harness, STREAM, TABLE};

#[tokio::test]
async fn test_replay_end_to_end() {
    let h = Harness::new();
    h.feed.add_stream(TABLE, STREAM).await;
    h.feed
        .add_closed_shard(
            STREAM,
            "shardId-00000001",
            vec![vec![
                insert_record("dev1", "100", Some("static"), (1.0, 2.0, 3.0), 100),
                insert_record("dev1", "200", Some("static"), (4.0, 5.0, 6.0), 200),
                insert_record("dev2", "150", Some("dynamic"), (7.0, 8.0, 9.0), 150),
            ]],
        )
        .await;

    let stats = h.consumer.replay(TABLE, ts(0)).await;

    assert_eq!(stats.dispatched, 3);
    assert_eq!(h.registry.len().await, 2);

    let dev1 = h.registry.lookup("dev1").await.unwrap();
    assert_eq!(dev1.classification, Classification::Static);
    assert_eq!(dev1.origin.sort_key, "100");
    assert_eq!(dev1.origin.position, Position::new(1.0, 2.0, 3.0));

    let dev2 = h.registry.lookup("dev2").await.unwrap();
    assert_eq!(dev2.classification, Classification::Dynamic);
    assert_eq!(dev2.history().unwrap().len(), 1);

    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_replay_window_keeps_recent_events_only() {
    let t = 1_700_000_000;
    let h = Harness::new();
    h.feed.add_stream(TABLE, STREAM).await;
    h.feed
        .add_closed_shard(
            STREAM,
            "shardId-00000001",
            vec![vec![
                insert_record("recent", "1", None, (1.0, 1.0, 1.0), t - 2 * 3600),
                insert_record("old", "2", None, (1.0, 1.0, 1.0), t - 25 * 3600),
            ]],
        )
        .await;

    h.consumer.replay(TABLE, ts(t - 24 * 3600)).await;

    assert!(h.registry.contains("recent").await);
    assert!(!h.registry.contains("old").await);
}

#[tokio::test]
async fn test_replay_dynamic_history_across_shards() {
    let h = Harness::new();
    h.feed.add_stream(TABLE, STREAM).await;
    h.feed
        .add_closed_shard(
            STREAM,
            "shardId-00000001",
            vec![vec![
                insert_record("truck", "300", Some("dynamic"), (3.0, 0.0, 0.0), 300),
                insert_record("truck", "100", Some("dynamic"), (1.0, 0.0, 0.0), 100),
            ]],
        )
        .await;
    h.feed
        .add_closed_shard(
            STREAM,
            "shardId-00000002",
            vec![
                vec![insert_record("truck", "200", Some("dynamic"), (2.0, 0.0, 0.0), 200)],
                vec![insert_record("truck", "100", Some("dynamic"), (1.0, 0.0, 0.0), 100)],
            ],
        )
        .await;

    let stats = h.consumer.replay(TABLE, ts(0)).await;

    assert_eq!(stats.shards, 2);
    let truck = h.registry.lookup("truck").await.unwrap();
    let keys: Vec<_> = truck
        .history()
        .unwrap()
        .iter()
        .map(|l| l.sort_key.clone())
        .collect();
    assert_eq!(keys, vec!["100", "200", "300"]);
    assert_eq!(truck.latest().position, Position::new(3.0, 0.0, 0.0));
}

#[tokio::test]
async fn test_replay_skips_bad_records_and_keeps_the_page() {
    let mut missing_id = marker_image("ghost", "100", None, (1.0, 1.0, 1.0));
    missing_id.remove("device_id");
    let mut bad_number = marker_image("broken", "100", None, (1.0, 1.0, 1.0));
    bad_number.insert(
        "latitude".to_string(),
        marker_sync::interfaces::AttributeValue::N("north".to_string()),
    );

    let h = Harness::new();
    h.feed.add_stream(TABLE, STREAM).await;
    h.feed
        .add_closed_shard(
            STREAM,
            "shardId-00000001",
            vec![vec![
                record_with_image(OperationType::Insert, missing_id, 100),
                record_with_image(OperationType::Insert, bad_number, 100),
                record_with_image(
                    OperationType::Modify,
                    marker_image("moved", "100", None, (1.0, 1.0, 1.0)),
                    100,
                ),
                insert_record("good", "100", None, (1.0, 1.0, 1.0), 100),
            ]],
        )
        .await;

    let stats = h.consumer.replay(TABLE, ts(0)).await;

    assert_eq!(stats.failures, 0);
    assert_eq!(stats.dispatched, 1);
    assert_eq!(h.registry.len().await, 1);
    assert!(h.registry.contains("good").await);
}

#[tokio::test]
async fn test_replay_of_feed_json() {
    let page: Vec<FeedRecord> = serde_json::from_str(
        r#"[
            {
                "eventID": "1",
                "eventName": "INSERT",
                "eventSource": "aws:dynamodb",
                "dynamodb": {
                    "ApproximateCreationDateTime": 1700000000,
                    "Keys": {"device_id": {"S": "pin-7"}, "created_timestamp": {"S": "1700000000"}},
                    "NewImage": {
                        "device_id": {"S": "pin-7"},
                        "created_timestamp": {"S": "1700000000"},
                        "longitude": {"N": "-122.42"},
                        "latitude": {"N": "37.77"},
                        "elevation": {"N": "16"},
                        "marker_type": {"S": "Temporary"}
                    },
                    "SequenceNumber": "111",
                    "SizeBytes": 120,
                    "StreamViewType": "NEW_IMAGE"
                }
            },
            {
                "eventID": "2",
                "eventName": "REMOVE",
                "dynamodb": {
                    "ApproximateCreationDateTime": 1700000050,
                    "Keys": {"device_id": {"S": "pin-7"}},
                    "SequenceNumber": "112"
                }
            }
        ]"#,
    )
    .unwrap();

    let h = Harness::new();
    h.feed.add_stream(TABLE, STREAM).await;
    h.feed
        .add_closed_shard(STREAM, "shardId-00000001", vec![page])
        .await;

    h.consumer.replay(TABLE, ts(0)).await;

    let pin = h.registry.lookup("pin-7").await.unwrap();
    assert_eq!(pin.classification, Classification::Temporary);
    assert_eq!(pin.origin.position, Position::new(-122.42, 37.77, 16.0));
    assert_eq!(pin.origin.occurred_at, ts(1_700_000_000));
}
