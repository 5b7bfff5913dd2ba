//! Table layout and AWS client configuration types.

use serde::Deserialize;

/// Attribute names of the marker table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AttributeNames {
    /// Partition key.
    pub entity_id: String,
    /// Sort key, a string-encoded unix timestamp.
    pub sort_key: String,
    /// Longitude or x.
    pub x: String,
    /// Latitude or y.
    pub y: String,
    /// Elevation or z.
    pub z: String,
    /// Optional classification tag (`static`, `temporary`, `dynamic`).
    pub classification: String,
}

impl Default for AttributeNames {
    fn default() -> Self {
        Self {
            entity_id: "device_id".to_string(),
            sort_key: "created_timestamp".to_string(),
            x: "longitude".to_string(),
            y: "latitude".to_string(),
            z: "elevation".to_string(),
            classification: "marker_type".to_string(),
        }
    }
}

/// AWS client configuration.
///
/// Credentials and region come from the default provider chain.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// Endpoint override, e.g. `http://localhost:8000` for DynamoDB Local.
    pub endpoint_url: Option<String>,
}
