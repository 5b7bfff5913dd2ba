//! Abstract interfaces for the collaborators of the stream consumer.
//!
//! These traits define the contracts for:
//! - Change feed (stream and shard discovery, iterator paging)
//! - Entity store (row persistence for user-created markers, bulk load)

pub mod entity_store;
pub mod feed;

pub use entity_store::{EntityStore, StoreError};
pub use feed::{
    AttributeValue, ChangeFeed, FeedError, FeedRecord, Image, OperationType, RecordsPage,
    ShardIteratorType, StreamRecord,
};
