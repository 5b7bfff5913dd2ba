//! DynamoDB EntityStore implementation.
//!
//! Table schema, names taken from [`AttributeNames`]:
//! - PK: entity id (String)
//! - SK: unix seconds as text (String)
//! - x / y / z (Number), classification (String)
//!
//! Sort keys of one entity must share a digit count for `latest` to order
//! them correctly.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use tracing::{debug, info, warn};

use crate::config::AttributeNames;
use crate::decoder::sort_key_time;
use crate::interfaces::entity_store::Result;
use crate::interfaces::{EntityStore, StoreError};
use crate::model::{Classification, Location, MarkerRow, Position};

type Item = HashMap<String, AttributeValue>;

/// DynamoDB implementation of EntityStore.
#[derive(Clone)]
pub struct DynamoEntityStore {
    client: Client,
    table_name: String,
    attributes: AttributeNames,
}

impl DynamoEntityStore {
    /// Create a new DynamoDB entity store.
    pub async fn new(
        table_name: impl Into<String>,
        attributes: AttributeNames,
        endpoint_url: Option<&str>,
    ) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let client = if let Some(endpoint) = endpoint_url {
            let dynamo_config = aws_sdk_dynamodb::config::Builder::from(&config)
                .endpoint_url(endpoint)
                .build();
            Client::from_conf(dynamo_config)
        } else {
            Client::new(&config)
        };

        let table_name = table_name.into();
        info!(table = %table_name, "Connected to DynamoDB for markers");

        Self {
            client,
            table_name,
            attributes,
        }
    }

    fn item_from_row(&self, row: &MarkerRow) -> Item {
        let names = &self.attributes;
        let position = &row.location.position;
        HashMap::from([
            (names.entity_id.clone(), AttributeValue::S(row.entity_id.clone())),
            (
                names.sort_key.clone(),
                AttributeValue::S(row.location.sort_key.clone()),
            ),
            (names.x.clone(), AttributeValue::N(position.x.to_string())),
            (names.y.clone(), AttributeValue::N(position.y.to_string())),
            (names.z.clone(), AttributeValue::N(position.z.to_string())),
            (
                names.classification.clone(),
                AttributeValue::S(row.classification.as_str().to_string()),
            ),
        ])
    }

    fn row_from_item(&self, item: &Item) -> Result<MarkerRow> {
        let names = &self.attributes;
        let entity_id = scalar(item, &names.entity_id)
            .ok_or_else(|| StoreError::MalformedRow {
                entity_id: String::new(),
                message: format!("missing '{}'", names.entity_id),
            })?
            .to_string();
        let malformed = |message: String| StoreError::MalformedRow {
            entity_id: entity_id.clone(),
            message,
        };

        let sort_key = scalar(item, &names.sort_key)
            .ok_or_else(|| malformed(format!("missing '{}'", names.sort_key)))?;
        let occurred_at = sort_key_time(sort_key)
            .ok_or_else(|| malformed(format!("sort key '{}' is not a timestamp", sort_key)))?;

        let number = |name: &str| -> Result<f64> {
            scalar(item, name)
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .ok_or_else(|| malformed(format!("'{}' is missing or not a number", name)))
        };
        let position = Position::new(number(&names.x)?, number(&names.y)?, number(&names.z)?);

        Ok(MarkerRow {
            entity_id: entity_id.clone(),
            classification: Classification::parse_or_default(scalar(item, &names.classification)),
            location: Location {
                sort_key: sort_key.to_string(),
                occurred_at,
                position,
            },
        })
    }
}

fn scalar<'a>(item: &'a Item, name: &str) -> Option<&'a str> {
    match item.get(name)? {
        AttributeValue::S(s) | AttributeValue::N(s) => Some(s.as_str()),
        _ => None,
    }
}

#[async_trait]
impl EntityStore for DynamoEntityStore {
    async fn put(&self, row: &MarkerRow) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(self.item_from_row(row)))
            .send()
            .await
            .map_err(|e| StoreError::Database(format!("DynamoDB put_item failed: {}", e)))?;

        debug!(
            entity_id = %row.entity_id,
            sort_key = %row.location.sort_key,
            "Stored marker in DynamoDB"
        );
        Ok(())
    }

    async fn delete(&self, entity_id: &str, sort_key: &str) -> Result<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(&self.attributes.entity_id, AttributeValue::S(entity_id.to_string()))
            .key(&self.attributes.sort_key, AttributeValue::S(sort_key.to_string()))
            .send()
            .await
            .map_err(|e| StoreError::Database(format!("DynamoDB delete_item failed: {}", e)))?;

        debug!(entity_id = %entity_id, sort_key = %sort_key, "Deleted marker from DynamoDB");
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<MarkerRow>> {
        let mut rows = Vec::new();
        let mut last_evaluated_key = None;

        loop {
            let response = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(last_evaluated_key.take())
                .send()
                .await
                .map_err(|e| StoreError::Database(format!("DynamoDB scan failed: {}", e)))?;

            for item in response.items() {
                match self.row_from_item(item) {
                    Ok(row) => rows.push(row),
                    Err(e) => warn!(table = %self.table_name, error = %e, "Skipping malformed row"),
                }
            }

            match response.last_evaluated_key() {
                Some(key) if !key.is_empty() => last_evaluated_key = Some(key.clone()),
                _ => break,
            }
        }

        debug!(table = %self.table_name, count = rows.len(), "Scanned markers");
        Ok(rows)
    }

    async fn latest(&self, entity_id: &str) -> Result<Option<MarkerRow>> {
        let response = self
            .client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression("#pk = :pk")
            .expression_attribute_names("#pk", &self.attributes.entity_id)
            .expression_attribute_values(":pk", AttributeValue::S(entity_id.to_string()))
            .scan_index_forward(false)
            .limit(1)
            .send()
            .await
            .map_err(|e| StoreError::Database(format!("DynamoDB query failed: {}", e)))?;

        response
            .items()
            .first()
            .map(|item| self.row_from_item(item))
            .transpose()
    }
}
