//! Test utilities for building feed records.
//!
//! Records use the default attribute names from [`AttributeNames`].
//!
//! [`AttributeNames`]: crate::config::AttributeNames

use chrono::{DateTime, Utc};

use crate::interfaces::{AttributeValue, FeedRecord, Image, OperationType, StreamRecord};

/// Unix seconds to a UTC timestamp.
pub fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// Build a NewImage with the default attribute names.
pub fn marker_image(
    entity_id: &str,
    sort_key: &str,
    classification: Option<&str>,
    position: (f64, f64, f64),
) -> Image {
    let mut image = Image::new();
    image.insert("device_id".to_string(), AttributeValue::S(entity_id.to_string()));
    image.insert(
        "created_timestamp".to_string(),
        AttributeValue::S(sort_key.to_string()),
    );
    image.insert("longitude".to_string(), AttributeValue::N(position.0.to_string()));
    image.insert("latitude".to_string(), AttributeValue::N(position.1.to_string()));
    image.insert("elevation".to_string(), AttributeValue::N(position.2.to_string()));
    if let Some(kind) = classification {
        image.insert("marker_type".to_string(), AttributeValue::S(kind.to_string()));
    }
    image
}

/// An INSERT record captured at `capture_secs`.
pub fn insert_record(
    entity_id: &str,
    sort_key: &str,
    classification: Option<&str>,
    position: (f64, f64, f64),
    capture_secs: i64,
) -> FeedRecord {
    record_with_image(
        OperationType::Insert,
        marker_image(entity_id, sort_key, classification, position),
        capture_secs,
    )
}

/// A record of any operation type around the given image.
pub fn record_with_image(event_name: OperationType, image: Image, capture_secs: i64) -> FeedRecord {
    FeedRecord {
        event_name,
        dynamodb: StreamRecord {
            approximate_creation_date_time: Some(ts(capture_secs)),
            new_image: Some(image),
            sequence_number: format!("{:021}", capture_secs),
        },
    }
}
