//! Stream record decoding.
//!
//! Turns a raw [`FeedRecord`] into a typed [`ChangeEvent`]. Only INSERT
//! records carry markers; MODIFY and REMOVE are skipped without error since
//! the table is written append-only.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::AttributeNames;
use crate::interfaces::{AttributeValue, FeedRecord, Image, OperationType};
use crate::model::{ChangeEvent, Classification, Position};

/// Result type for decoding.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Per-record decode failures. Always non-fatal: callers log and move on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("Record is missing required field '{0}'")]
    MissingRequiredField(String),

    #[error("Field '{field}' is not a number: '{value}'")]
    MalformedNumeric { field: String, value: String },
}

/// Decodes stream records using the table's attribute names.
#[derive(Debug, Clone, Default)]
pub struct RecordDecoder {
    attributes: AttributeNames,
}

impl RecordDecoder {
    pub fn new(attributes: AttributeNames) -> Self {
        Self { attributes }
    }

    /// Decode one record.
    ///
    /// Returns `Ok(None)` for anything other than an INSERT.
    pub fn decode(&self, record: &FeedRecord) -> Result<Option<ChangeEvent>> {
        if record.event_name != OperationType::Insert {
            debug!(
                event_name = ?record.event_name,
                sequence_number = %record.dynamodb.sequence_number,
                "Skipping non-insert record"
            );
            return Ok(None);
        }

        let stream = &record.dynamodb;
        let image = stream
            .new_image
            .as_ref()
            .ok_or_else(|| DecodeError::MissingRequiredField("NewImage".to_string()))?;

        let entity_id = self.required_scalar(image, &self.attributes.entity_id)?;
        if entity_id.is_empty() {
            return Err(DecodeError::MissingRequiredField(
                self.attributes.entity_id.clone(),
            ));
        }
        let sort_key = self.required_scalar(image, &self.attributes.sort_key)?;

        let classification = Classification::parse_or_default(
            image
                .get(&self.attributes.classification)
                .and_then(AttributeValue::as_scalar),
        );

        let position = Position::new(
            self.numeric(image, &self.attributes.x)?,
            self.numeric(image, &self.attributes.y)?,
            self.numeric(image, &self.attributes.z)?,
        );

        let sort_time = sort_key_time(sort_key);
        let approx_capture_time = stream
            .approximate_creation_date_time
            .or(sort_time)
            .unwrap_or_else(Utc::now);
        let occurred_at = sort_time.unwrap_or(approx_capture_time);

        Ok(Some(ChangeEvent {
            entity_id: entity_id.to_string(),
            sort_key: sort_key.to_string(),
            occurred_at,
            approx_capture_time,
            classification,
            position,
            sequence_number: stream.sequence_number.clone(),
        }))
    }

    fn required_scalar<'a>(&self, image: &'a Image, name: &str) -> Result<&'a str> {
        image
            .get(name)
            .and_then(AttributeValue::as_scalar)
            .ok_or_else(|| DecodeError::MissingRequiredField(name.to_string()))
    }

    fn numeric(&self, image: &Image, name: &str) -> Result<f64> {
        let raw = self.required_scalar(image, name)?;
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| DecodeError::MalformedNumeric {
                field: name.to_string(),
                value: raw.to_string(),
            })
    }
}

/// Sort keys are unix seconds written as text.
pub(crate) fn sort_key_time(sort_key: &str) -> Option<DateTime<Utc>> {
    sort_key
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}
