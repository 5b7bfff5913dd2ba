//! Cycle-scoped errors.
//!
//! None of these are fatal to the consumer. A failed discovery, iterator
//! request or page fetch aborts the current shard or poll cycle and the next
//! scheduled cycle starts over.

use crate::interfaces::{FeedError, StoreError};

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Discovery failed for {target}: {message}")]
    DiscoveryFailed { target: String, message: String },

    #[error("Could not create shard iterator for {stream}/{shard}: {message}")]
    IteratorCreationFailed {
        stream: String,
        shard: String,
        message: String,
    },

    #[error("GetRecords failed for shard {shard}: {source}")]
    FetchFailed {
        shard: String,
        #[source]
        source: FeedError,
    },

    #[error("Entity store error: {0}")]
    Store(#[from] StoreError),

    #[error("No entity store configured")]
    NoStore,
}

impl SyncError {
    /// The failed fetch left the shard iterator unusable: it expired, was
    /// trimmed, or the shard is gone. Other fetch failures can be retried
    /// with the same iterator.
    pub fn invalidates_cursor(&self) -> bool {
        matches!(
            self,
            SyncError::FetchFailed {
                source: FeedError::ExpiredIterator(_) | FeedError::NotFound(_),
                ..
            }
        )
    }
}
