//! Live listening against a scripted feed.

use std::time::Duration;

use marker_sync::test_utils::{insert_record, ts};
use marker_sync::ListenState;

use crate::common::{Harness, STREAM, TABLE};

const SHARD: &str = "shardId-00000001";
const TICK: Duration = Duration::from_millis(10);

async fn wait_for_marker(h: &Harness, entity_id: &str) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !h.registry.contains(entity_id).await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{} never arrived", entity_id));
}

/// Wait until at least `count` more GetRecords calls happened after `from`.
async fn wait_for_polls(h: &Harness, from: usize, count: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while h.feed.get_records_calls() < from + count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("listener stopped polling");
}

#[tokio::test]
async fn test_listen_toggle() {
    let h = Harness::new();

    assert_eq!(
        h.consumer.start_listening(TABLE, TICK).await,
        ListenState::Listening
    );
    assert_eq!(h.consumer.start_listening(TABLE, TICK).await, ListenState::Idle);
    assert_eq!(h.consumer.listen_state().await, ListenState::Idle);

    assert_eq!(
        h.consumer.start_listening(TABLE, TICK).await,
        ListenState::Listening
    );
    assert_eq!(h.consumer.stop_listening().await, ListenState::Idle);
    assert_eq!(h.consumer.stop_listening().await, ListenState::Idle);
    assert!(!h.consumer.is_listening().await);
}

#[tokio::test]
async fn test_replay_then_listen() {
    let h = Harness::new();
    h.feed.add_stream(TABLE, STREAM).await;
    h.feed
        .add_shard(
            STREAM,
            SHARD,
            vec![vec![insert_record("replayed", "100", Some("dynamic"), (1.0, 1.0, 1.0), 100)]],
        )
        .await;

    h.consumer.replay(TABLE, ts(0)).await;
    assert!(h.registry.contains("replayed").await);

    let before_listen = h.feed.get_records_calls();
    h.consumer.start_listening(TABLE, TICK).await;
    wait_for_polls(&h, before_listen, 1).await;

    h.feed
        .push_page(
            STREAM,
            SHARD,
            vec![
                insert_record("replayed", "200", Some("dynamic"), (2.0, 2.0, 2.0), 200),
                insert_record("live", "200", Some("static"), (5.0, 5.0, 5.0), 200),
            ],
        )
        .await;
    wait_for_marker(&h, "live").await;
    h.consumer.stop_listening().await;

    let replayed = h.registry.lookup("replayed").await.unwrap();
    assert_eq!(replayed.history().unwrap().len(), 2);
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_listen_delivers_records_written_during_feed_outage() {
    let h = Harness::new();
    h.feed.add_stream(TABLE, STREAM).await;
    h.feed.add_shard(STREAM, SHARD, vec![]).await;

    h.consumer.start_listening(TABLE, TICK).await;
    wait_for_polls(&h, 0, 1).await;

    h.feed.set_fail_get_records(true).await;
    h.feed
        .push_page(
            STREAM,
            SHARD,
            vec![insert_record("during-outage", "300", None, (1.0, 1.0, 1.0), 300)],
        )
        .await;
    wait_for_polls(&h, h.feed.get_records_calls(), 2).await;
    assert!(h.consumer.is_listening().await);

    h.feed.set_fail_get_records(false).await;
    wait_for_marker(&h, "during-outage").await;

    h.feed
        .push_page(
            STREAM,
            SHARD,
            vec![insert_record("after-outage", "400", None, (1.0, 1.0, 1.0), 400)],
        )
        .await;
    wait_for_marker(&h, "after-outage").await;

    h.consumer.stop_listening().await;
    assert_eq!(h.feed.get_shard_iterator_calls(), 1);
}
