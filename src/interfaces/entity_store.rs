//! Entity store interface.

use async_trait::async_trait;

use crate::model::MarkerRow;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Malformed row for {entity_id}: {message}")]
    MalformedRow { entity_id: String, message: String },
}

/// Interface for marker row persistence.
///
/// The streaming path never writes here: rows observed on the change feed
/// already exist in the table they came from.
///
/// Implementations:
/// - `DynamoEntityStore`: DynamoDB table (feature `dynamo`)
/// - `MemoryEntityStore`: in-memory map
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert or replace the row keyed by `(entity_id, sort_key)`.
    async fn put(&self, row: &MarkerRow) -> Result<()>;

    /// Delete the row keyed by `(entity_id, sort_key)`. Missing rows are not an error.
    async fn delete(&self, entity_id: &str, sort_key: &str) -> Result<()>;

    /// Every row in the table.
    async fn scan(&self) -> Result<Vec<MarkerRow>>;

    /// The newest row for an entity, by sort key.
    async fn latest(&self, entity_id: &str) -> Result<Option<MarkerRow>>;
}
