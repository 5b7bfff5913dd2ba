//! Stream and shard discovery.
//!
//! Resolves which streams a table has and which shards a stream has. Nothing
//! is cached: each call re-queries the feed, which is acceptable because
//! discovery runs at most once per poll cycle.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::interfaces::ChangeFeed;

/// Feed discovery queries.
#[derive(Clone)]
pub struct Discovery {
    feed: Arc<dyn ChangeFeed>,
}

impl Discovery {
    pub fn new(feed: Arc<dyn ChangeFeed>) -> Self {
        Self { feed }
    }

    /// Stream ids of a table. Empty when streams are disabled on the table.
    pub async fn list_streams(&self, table: &str) -> Result<Vec<String>> {
        let streams = self
            .feed
            .list_streams(table)
            .await
            .map_err(|e| SyncError::DiscoveryFailed {
                target: table.to_string(),
                message: e.to_string(),
            })?;

        info!(table = %table, count = streams.len(), "Found streams");
        Ok(streams)
    }

    /// Shard ids of a stream, in the order the feed lists them.
    pub async fn list_shards(&self, stream_id: &str) -> Result<Vec<String>> {
        let shards = self
            .feed
            .describe_stream(stream_id)
            .await
            .map_err(|e| SyncError::DiscoveryFailed {
                target: stream_id.to_string(),
                message: e.to_string(),
            })?;

        debug!(stream = %stream_id, count = shards.len(), "Found shards");
        Ok(shards)
    }

    /// First stream of the table and its first shard, if any.
    pub async fn first_shard(&self, table: &str) -> Result<Option<(String, String)>> {
        let Some(stream_id) = self.list_streams(table).await?.into_iter().next() else {
            return Ok(None);
        };
        let shard_id = self.list_shards(&stream_id).await?.into_iter().next();
        Ok(shard_id.map(|shard_id| (stream_id, shard_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::MockChangeFeed;

    async fn setup() -> (Arc<MockChangeFeed>, Discovery) {
        let feed = Arc::new(MockChangeFeed::new());
        let discovery = Discovery::new(feed.clone());
        (feed, discovery)
    }

    #[tokio::test]
    async fn test_list_streams_empty_table() {
        let (_, discovery) = setup().await;
        assert!(discovery.list_streams("markers").await.unwrap().is_empty());
        assert_eq!(discovery.first_shard("markers").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stream_without_shards() {
        let (feed, discovery) = setup().await;
        feed.add_stream("markers", "stream-1").await;

        assert_eq!(discovery.list_streams("markers").await.unwrap(), vec!["stream-1"]);
        assert!(discovery.list_shards("stream-1").await.unwrap().is_empty());
        assert_eq!(discovery.first_shard("markers").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_first_shard_picks_first_stream_and_shard() {
        let (feed, discovery) = setup().await;
        feed.add_stream("markers", "stream-1").await;
        feed.add_stream("markers", "stream-2").await;
        feed.add_shard("stream-1", "shard-a", vec![]).await;
        feed.add_shard("stream-1", "shard-b", vec![]).await;
        feed.add_shard("stream-2", "shard-c", vec![]).await;

        assert_eq!(
            discovery.first_shard("markers").await.unwrap(),
            Some(("stream-1".to_string(), "shard-a".to_string()))
        );
        assert_eq!(
            discovery.list_shards("stream-1").await.unwrap(),
            vec!["shard-a", "shard-b"]
        );
    }

    #[tokio::test]
    async fn test_feed_error_is_discovery_failed() {
        let (feed, discovery) = setup().await;
        feed.set_fail_list_streams(true).await;
        let err = discovery.list_streams("markers").await.unwrap_err();
        assert!(matches!(err, SyncError::DiscoveryFailed { ref target, .. } if target == "markers"));
        assert!(err.to_string().contains("ListStreams unavailable"));

        feed.set_fail_list_streams(false).await;
        feed.set_fail_describe_stream(true).await;
        feed.add_stream("markers", "stream-1").await;
        assert!(matches!(
            discovery.first_shard("markers").await,
            Err(SyncError::DiscoveryFailed { .. })
        ));
    }
}
