//! Scripted in-memory change feed.
//!
//! Each shard holds a list of pages. Iterator tokens encode
//! `stream|shard|page`. An open shard keeps handing out empty pages past its
//! last scripted page, so pages pushed later become visible to a live
//! cursor. A closed shard stops returning a next iterator after its last page.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::interfaces::feed::Result;
use crate::interfaces::{ChangeFeed, FeedError, FeedRecord, RecordsPage, ShardIteratorType};

#[derive(Default)]
struct MockShard {
    pages: Vec<Vec<FeedRecord>>,
    closed: bool,
}

/// Scripted change feed with failure toggles and call counters.
#[derive(Default)]
pub struct MockChangeFeed {
    streams: RwLock<HashMap<String, Vec<String>>>,
    shard_order: RwLock<HashMap<String, Vec<String>>>,
    shards: RwLock<HashMap<(String, String), MockShard>>,
    fail_list_streams: RwLock<bool>,
    fail_describe_stream: RwLock<bool>,
    fail_get_shard_iterator: RwLock<bool>,
    fail_get_records: RwLock<bool>,
    expire_iterators: RwLock<bool>,
    get_records_calls: AtomicUsize,
    get_shard_iterator_calls: AtomicUsize,
}

impl MockChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a stream to a table.
    pub async fn add_stream(&self, table: &str, stream_id: &str) {
        self.streams
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(stream_id.to_string());
        self.shard_order
            .write()
            .await
            .entry(stream_id.to_string())
            .or_default();
    }

    /// Add an open shard with the given pages.
    pub async fn add_shard(&self, stream_id: &str, shard_id: &str, pages: Vec<Vec<FeedRecord>>) {
        self.insert_shard(stream_id, shard_id, pages, false).await;
    }

    /// Add a closed shard with the given pages.
    pub async fn add_closed_shard(
        &self,
        stream_id: &str,
        shard_id: &str,
        pages: Vec<Vec<FeedRecord>>,
    ) {
        self.insert_shard(stream_id, shard_id, pages, true).await;
    }

    async fn insert_shard(
        &self,
        stream_id: &str,
        shard_id: &str,
        pages: Vec<Vec<FeedRecord>>,
        closed: bool,
    ) {
        self.shard_order
            .write()
            .await
            .entry(stream_id.to_string())
            .or_default()
            .push(shard_id.to_string());
        self.shards.write().await.insert(
            (stream_id.to_string(), shard_id.to_string()),
            MockShard { pages, closed },
        );
    }

    /// Append a page to an existing shard.
    pub async fn push_page(&self, stream_id: &str, shard_id: &str, records: Vec<FeedRecord>) {
        if let Some(shard) = self
            .shards
            .write()
            .await
            .get_mut(&(stream_id.to_string(), shard_id.to_string()))
        {
            shard.pages.push(records);
        }
    }

    pub async fn set_fail_list_streams(&self, fail: bool) {
        *self.fail_list_streams.write().await = fail;
    }

    pub async fn set_fail_describe_stream(&self, fail: bool) {
        *self.fail_describe_stream.write().await = fail;
    }

    pub async fn set_fail_get_shard_iterator(&self, fail: bool) {
        *self.fail_get_shard_iterator.write().await = fail;
    }

    pub async fn set_fail_get_records(&self, fail: bool) {
        *self.fail_get_records.write().await = fail;
    }

    /// Reject every outstanding iterator as expired on GetRecords.
    pub async fn set_expire_iterators(&self, expire: bool) {
        *self.expire_iterators.write().await = expire;
    }

    pub fn get_records_calls(&self) -> usize {
        self.get_records_calls.load(Ordering::SeqCst)
    }

    pub fn get_shard_iterator_calls(&self) -> usize {
        self.get_shard_iterator_calls.load(Ordering::SeqCst)
    }

    fn token(stream_id: &str, shard_id: &str, page: usize) -> String {
        format!("{}|{}|{}", stream_id, shard_id, page)
    }

    fn parse_token(token: &str) -> Option<(String, String, usize)> {
        let mut parts = token.rsplitn(3, '|');
        let page = parts.next()?.parse().ok()?;
        let shard = parts.next()?.to_string();
        let stream = parts.next()?.to_string();
        Some((stream, shard, page))
    }
}

#[async_trait]
impl ChangeFeed for MockChangeFeed {
    async fn list_streams(&self, table: &str) -> Result<Vec<String>> {
        if *self.fail_list_streams.read().await {
            return Err(FeedError::Request("ListStreams unavailable".to_string()));
        }
        Ok(self
            .streams
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default())
    }

    async fn describe_stream(&self, stream_id: &str) -> Result<Vec<String>> {
        if *self.fail_describe_stream.read().await {
            return Err(FeedError::Request("DescribeStream unavailable".to_string()));
        }
        Ok(self
            .shard_order
            .read()
            .await
            .get(stream_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_shard_iterator(
        &self,
        stream_id: &str,
        shard_id: &str,
        iterator_type: ShardIteratorType,
    ) -> Result<String> {
        self.get_shard_iterator_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_get_shard_iterator.read().await {
            return Err(FeedError::Request("GetShardIterator unavailable".to_string()));
        }
        let shards = self.shards.read().await;
        let shard = shards
            .get(&(stream_id.to_string(), shard_id.to_string()))
            .ok_or_else(|| FeedError::NotFound(format!("{}/{}", stream_id, shard_id)))?;

        let page = match iterator_type {
            ShardIteratorType::TrimHorizon => 0,
            ShardIteratorType::Latest => shard.pages.len(),
        };
        Ok(Self::token(stream_id, shard_id, page))
    }

    async fn get_records(&self, iterator: &str, _limit: Option<u32>) -> Result<RecordsPage> {
        self.get_records_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_get_records.read().await {
            return Err(FeedError::Request("GetRecords unavailable".to_string()));
        }
        if *self.expire_iterators.read().await {
            return Err(FeedError::ExpiredIterator(iterator.to_string()));
        }
        let (stream_id, shard_id, page) = Self::parse_token(iterator)
            .ok_or_else(|| FeedError::ExpiredIterator(iterator.to_string()))?;

        let shards = self.shards.read().await;
        let shard = shards
            .get(&(stream_id.clone(), shard_id.clone()))
            .ok_or_else(|| FeedError::ExpiredIterator(iterator.to_string()))?;

        let records = shard.pages.get(page).cloned().unwrap_or_default();
        let next_page = if page < shard.pages.len() { page + 1 } else { page };
        let next_iterator = if shard.closed && next_page >= shard.pages.len() {
            None
        } else {
            Some(Self::token(&stream_id, &shard_id, next_page))
        };

        Ok(RecordsPage {
            records,
            next_iterator,
        })
    }
}
