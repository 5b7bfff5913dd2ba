//! Entity store implementations.
//!
//! - `memory`: in-memory map for tests and embedding hosts
//! - `dynamo`: DynamoDB table (feature `dynamo`)

pub mod memory;

#[cfg(feature = "dynamo")]
pub mod dynamo;

pub use memory::MemoryEntityStore;

#[cfg(feature = "dynamo")]
pub use dynamo::DynamoEntityStore;
