//! marker-sync - DynamoDB Streams consumer for geolocated markers
//!
//! Replays recent inserts and tails new ones from a table's change feed,
//! folding them into an in-memory registry of tracked markers.
//!
//! ```text
//! ChangeFeed --> Discovery --> ShardIterator --> RecordDecoder
//!                                                     |
//!                                                     v
//!              EntityStore <-- Dispatcher <------ StreamConsumer
//!                                  |
//!                                  v
//!                            EntityRegistry
//! ```

pub mod config;
pub mod consumer;
pub mod decoder;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod feed;
pub mod interfaces;
pub mod model;
pub mod registry;
pub mod shard;
pub mod storage;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod utils;

pub use config::Config;
pub use consumer::{ListenState, LoadStats, ReplayStats, StreamConsumer};
pub use decoder::{DecodeError, RecordDecoder};
pub use discovery::Discovery;
pub use dispatcher::{DispatchOutcome, Dispatcher, Persist};
pub use error::{Result, SyncError};
pub use interfaces::{ChangeFeed, EntityStore, FeedError, StoreError};
pub use model::{ChangeEvent, Classification, Location, MarkerRow, Position};
pub use registry::{Entity, EntityRegistry, History, RegistryError};
pub use shard::{ShardCursor, ShardIterator};
