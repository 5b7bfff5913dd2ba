//! Shared fixtures for integration tests.

use std::sync::Arc;

use marker_sync::config::{AttributeNames, StreamConfig};
use marker_sync::feed::MockChangeFeed;
use marker_sync::storage::MemoryEntityStore;
use marker_sync::{Dispatcher, EntityRegistry, StreamConsumer};

pub const TABLE: &str = "markers";
pub const STREAM: &str = "arn:aws:dynamodb:us-east-1:000000000000:table/markers/stream/2024-01-01T00:00:00.000";

/// A consumer wired to a scripted feed and an in-memory store.
pub struct Harness {
    pub feed: Arc<MockChangeFeed>,
    pub store: Arc<MemoryEntityStore>,
    pub registry: Arc<EntityRegistry>,
    pub consumer: StreamConsumer,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryEntityStore::new())
    }

    pub fn with_store(store: MemoryEntityStore) -> Self {
        let feed = Arc::new(MockChangeFeed::new());
        let store = Arc::new(store);
        let registry = Arc::new(EntityRegistry::new());
        let dispatcher = Dispatcher::new(registry.clone()).with_store(store.clone());
        let consumer = StreamConsumer::new(
            feed.clone(),
            dispatcher,
            StreamConfig::with_table(TABLE),
            AttributeNames::default(),
        );
        Self {
            feed,
            store,
            registry,
            consumer,
        }
    }
}
