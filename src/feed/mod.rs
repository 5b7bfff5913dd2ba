//! Change feed implementations.
//!
//! - `mock`: scripted in-memory feed for tests and embedding hosts
//! - `dynamo`: AWS DynamoDB Streams (feature `dynamo`)

pub mod mock;

#[cfg(feature = "dynamo")]
pub mod dynamo;

pub use mock::MockChangeFeed;

#[cfg(feature = "dynamo")]
pub use dynamo::DynamoStreamsFeed;
