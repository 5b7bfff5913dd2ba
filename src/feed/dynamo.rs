//! DynamoDB Streams change feed.
//!
//! Stream and shard listings are paged internally so callers always receive
//! complete lists.

use async_trait::async_trait;
use aws_sdk_dynamodbstreams::types::{
    AttributeValue as SdkAttributeValue, OperationType as SdkOperationType, Record,
    ShardIteratorType as SdkShardIteratorType,
};
use aws_sdk_dynamodbstreams::Client;
use chrono::DateTime;
use tracing::{debug, info};

use crate::interfaces::feed::Result;
use crate::interfaces::{
    AttributeValue, ChangeFeed, FeedError, FeedRecord, Image, OperationType, RecordsPage,
    ShardIteratorType, StreamRecord,
};

/// DynamoDB Streams implementation of ChangeFeed.
#[derive(Clone)]
pub struct DynamoStreamsFeed {
    client: Client,
}

impl DynamoStreamsFeed {
    /// Connect using the default AWS provider chain.
    pub async fn new(endpoint_url: Option<&str>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let client = if let Some(endpoint) = endpoint_url {
            let streams_config = aws_sdk_dynamodbstreams::config::Builder::from(&config)
                .endpoint_url(endpoint)
                .build();
            Client::from_conf(streams_config)
        } else {
            Client::new(&config)
        };

        info!(endpoint = ?endpoint_url, "Connected to DynamoDB Streams");
        Self { client }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChangeFeed for DynamoStreamsFeed {
    async fn list_streams(&self, table: &str) -> Result<Vec<String>> {
        let mut streams = Vec::new();
        let mut start_arn: Option<String> = None;

        loop {
            let response = self
                .client
                .list_streams()
                .table_name(table)
                .set_exclusive_start_stream_arn(start_arn.take())
                .send()
                .await
                .map_err(|e| {
                    FeedError::Request(format!("DynamoDB Streams ListStreams failed: {}", e))
                })?;

            streams.extend(
                response
                    .streams()
                    .iter()
                    .filter_map(|s| s.stream_arn().map(str::to_string)),
            );

            match response.last_evaluated_stream_arn() {
                Some(arn) if !arn.is_empty() => start_arn = Some(arn.to_string()),
                _ => break,
            }
        }

        debug!(table = %table, count = streams.len(), "Listed streams");
        Ok(streams)
    }

    async fn describe_stream(&self, stream_id: &str) -> Result<Vec<String>> {
        let mut shards = Vec::new();
        let mut start_shard: Option<String> = None;

        loop {
            let response = self
                .client
                .describe_stream()
                .stream_arn(stream_id)
                .set_exclusive_start_shard_id(start_shard.take())
                .send()
                .await
                .map_err(|e| {
                    let not_found = e
                        .as_service_error()
                        .is_some_and(|se| se.is_resource_not_found_exception());
                    if not_found {
                        FeedError::NotFound(stream_id.to_string())
                    } else {
                        FeedError::Request(format!(
                            "DynamoDB Streams DescribeStream failed: {}",
                            e
                        ))
                    }
                })?;

            let Some(description) = response.stream_description() else {
                break;
            };
            shards.extend(
                description
                    .shards()
                    .iter()
                    .filter_map(|s| s.shard_id().map(str::to_string)),
            );

            match description.last_evaluated_shard_id() {
                Some(id) if !id.is_empty() => start_shard = Some(id.to_string()),
                _ => break,
            }
        }

        debug!(stream = %stream_id, count = shards.len(), "Described stream");
        Ok(shards)
    }

    async fn get_shard_iterator(
        &self,
        stream_id: &str,
        shard_id: &str,
        iterator_type: ShardIteratorType,
    ) -> Result<String> {
        let sdk_type = match iterator_type {
            ShardIteratorType::TrimHorizon => SdkShardIteratorType::TrimHorizon,
            ShardIteratorType::Latest => SdkShardIteratorType::Latest,
        };

        let response = self
            .client
            .get_shard_iterator()
            .stream_arn(stream_id)
            .shard_id(shard_id)
            .shard_iterator_type(sdk_type)
            .send()
            .await
            .map_err(|e| {
                let not_found = e
                    .as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception());
                if not_found {
                    FeedError::NotFound(format!("{}/{}", stream_id, shard_id))
                } else {
                    FeedError::Request(format!(
                        "DynamoDB Streams GetShardIterator failed: {}",
                        e
                    ))
                }
            })?;

        response
            .shard_iterator()
            .map(str::to_string)
            .ok_or_else(|| FeedError::NotFound(format!("{}/{}", stream_id, shard_id)))
    }

    async fn get_records(&self, iterator: &str, limit: Option<u32>) -> Result<RecordsPage> {
        let response = self
            .client
            .get_records()
            .shard_iterator(iterator)
            .set_limit(limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX)))
            .send()
            .await
            .map_err(|e| {
                let expired = e.as_service_error().is_some_and(|se| {
                    se.is_expired_iterator_exception() || se.is_trimmed_data_access_exception()
                });
                if expired {
                    FeedError::ExpiredIterator(e.to_string())
                } else {
                    FeedError::Request(format!("DynamoDB Streams GetRecords failed: {}", e))
                }
            })?;

        Ok(RecordsPage {
            records: response.records().iter().map(convert_record).collect(),
            next_iterator: response.next_shard_iterator().map(str::to_string),
        })
    }
}

fn convert_record(record: &Record) -> FeedRecord {
    let event_name = match record.event_name() {
        Some(SdkOperationType::Insert) => OperationType::Insert,
        Some(SdkOperationType::Modify) => OperationType::Modify,
        Some(SdkOperationType::Remove) => OperationType::Remove,
        _ => OperationType::Unknown,
    };

    let dynamodb = record
        .dynamodb()
        .map(|data| StreamRecord {
            approximate_creation_date_time: data
                .approximate_creation_date_time()
                .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
            new_image: data.new_image().map(convert_image),
            sequence_number: data.sequence_number().unwrap_or_default().to_string(),
        })
        .unwrap_or_default();

    FeedRecord {
        event_name,
        dynamodb,
    }
}

fn convert_image(image: &std::collections::HashMap<String, SdkAttributeValue>) -> Image {
    image
        .iter()
        .filter_map(|(name, value)| convert_value(value).map(|v| (name.clone(), v)))
        .collect()
}

/// Binary attributes have no counterpart and are dropped.
fn convert_value(value: &SdkAttributeValue) -> Option<AttributeValue> {
    Some(match value {
        SdkAttributeValue::S(s) => AttributeValue::S(s.clone()),
        SdkAttributeValue::N(n) => AttributeValue::N(n.clone()),
        SdkAttributeValue::Bool(b) => AttributeValue::Bool(*b),
        SdkAttributeValue::Null(b) => AttributeValue::Null(*b),
        SdkAttributeValue::Ss(values) => AttributeValue::SS(values.clone()),
        SdkAttributeValue::Ns(values) => AttributeValue::NS(values.clone()),
        SdkAttributeValue::M(map) => AttributeValue::M(convert_image(map)),
        SdkAttributeValue::L(items) => {
            AttributeValue::L(items.iter().filter_map(convert_value).collect())
        }
        _ => return None,
    })
}
