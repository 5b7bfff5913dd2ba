//! Change feed interface.
//!
//! Minimal CDC contract modelled on DynamoDB Streams. Record types deserialize
//! from the DynamoDB Streams JSON shape, so fixtures and alternate providers
//! can hand over the same structure.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Errors reported by a change feed provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FeedError {
    #[error("Feed request failed: {0}")]
    Request(String),

    #[error("Shard iterator expired or invalid: {0}")]
    ExpiredIterator(String),

    #[error("Resource not found: {0}")]
    NotFound(String),
}

/// Typed attribute value in DynamoDB JSON encoding (`{"S": "..."}`, `{"N": "..."}`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum AttributeValue {
    S(String),
    /// Numbers travel as strings.
    N(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    SS(Vec<String>),
    NS(Vec<String>),
    M(HashMap<String, AttributeValue>),
    L(Vec<AttributeValue>),
}

impl AttributeValue {
    /// The raw scalar text of an `S` or `N` value.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) | AttributeValue::N(s) => Some(s),
            _ => None,
        }
    }
}

/// An item image: attribute name to value.
pub type Image = HashMap<String, AttributeValue>;

/// Kind of row mutation a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    Insert,
    Modify,
    Remove,
    #[serde(other)]
    Unknown,
}

/// The `dynamodb` section of a stream record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamRecord {
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub approximate_creation_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub new_image: Option<Image>,
    #[serde(default)]
    pub sequence_number: String,
}

/// One change record as delivered by the feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedRecord {
    #[serde(rename = "eventName")]
    pub event_name: OperationType,
    pub dynamodb: StreamRecord,
}

/// Iterator starting position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardIteratorType {
    /// Oldest untrimmed record in the shard.
    TrimHorizon,
    /// Only records written after the iterator was issued.
    Latest,
}

impl fmt::Display for ShardIteratorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardIteratorType::TrimHorizon => f.write_str("TRIM_HORIZON"),
            ShardIteratorType::Latest => f.write_str("LATEST"),
        }
    }
}

/// One page of records and the iterator for the next page.
#[derive(Debug, Clone, Default)]
pub struct RecordsPage {
    pub records: Vec<FeedRecord>,
    /// `None` when the shard is closed and fully read.
    pub next_iterator: Option<String>,
}

/// Interface for a change-data-capture feed.
///
/// Implementations:
/// - `DynamoStreamsFeed`: AWS DynamoDB Streams (feature `dynamo`)
/// - `MockChangeFeed`: scripted in-memory feed
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// List stream ids attached to a table.
    async fn list_streams(&self, table: &str) -> Result<Vec<String>>;

    /// List shard ids of a stream.
    async fn describe_stream(&self, stream_id: &str) -> Result<Vec<String>>;

    /// Request an iterator token for a shard.
    async fn get_shard_iterator(
        &self,
        stream_id: &str,
        shard_id: &str,
        iterator_type: ShardIteratorType,
    ) -> Result<String>;

    /// Fetch one page of records. `limit` of `None` uses the feed default.
    async fn get_records(&self, iterator: &str, limit: Option<u32>) -> Result<RecordsPage>;
}
