//! marker-sync: headless change feed consumer
//!
//! Loads the marker table, replays the configured window of the table's
//! stream, then listens for new inserts until Ctrl-C.
//!
//! ## Configuration
//! - `marker-sync.yaml` in the working directory, or the file named by
//!   MARKER_SYNC_CONFIG, or the first command-line argument
//! - MARKER_SYNC__* environment overrides (e.g. MARKER_SYNC__STREAM__TABLE_NAME)
//! - MARKER_SYNC_LOG: tracing filter (default: info)

use std::sync::Arc;

use tracing::info;

use marker_sync::feed::DynamoStreamsFeed;
use marker_sync::storage::DynamoEntityStore;
use marker_sync::utils::bootstrap::{init_tracing, with_retry};
use marker_sync::{Config, Dispatcher, EntityRegistry, StreamConsumer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;
    let endpoint = config.aws.endpoint_url.as_deref();

    let feed = Arc::new(DynamoStreamsFeed::new(endpoint).await);
    let store = Arc::new(
        DynamoEntityStore::new(
            config.stream.table_name.clone(),
            config.attributes.clone(),
            endpoint,
        )
        .await,
    );

    let registry = Arc::new(EntityRegistry::new());
    let dispatcher = Dispatcher::new(registry.clone()).with_store(store);
    let consumer = StreamConsumer::new(
        feed,
        dispatcher,
        config.stream.clone(),
        config.attributes.clone(),
    );

    with_retry("initial load", || consumer.load_all(true)).await?;
    consumer.replay_recent().await;
    info!(markers = registry.len().await, "Initial sync complete");

    consumer
        .start_listening(&config.stream.table_name, config.stream.poll_interval())
        .await;
    info!(table = %config.stream.table_name, "marker-sync started");

    tokio::signal::ctrl_c().await?;

    consumer.stop_listening().await;
    info!(markers = registry.len().await, "marker-sync stopped");
    Ok(())
}
