//! Shard iteration.
//!
//! A [`ShardCursor`] holds the paging state of one shard: the current
//! iterator token and a count of consecutive empty pages. The
//! [`ShardIterator`] issues cursors and advances them one page at a time.
//! Pages of a single cursor must be fetched sequentially to keep the
//! feed's order within the shard.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::decoder::RecordDecoder;
use crate::error::{Result, SyncError};
use crate::interfaces::{ChangeFeed, ShardIteratorType};
use crate::model::ChangeEvent;

/// Paging state for one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardCursor {
    pub stream_id: String,
    pub shard_id: String,
    pub iterator_type: ShardIteratorType,
    /// `None` once the feed reports no further pages.
    pub iterator_token: Option<String>,
    pub empty_page_count: u32,
    pub max_empty_pages: u32,
    pub pages_fetched: u64,
    pub records_seen: u64,
}

impl ShardCursor {
    /// The feed reported no next iterator: the shard is closed and read to the end.
    pub fn is_closed(&self) -> bool {
        self.iterator_token.is_none()
    }

    /// Closed, or more than `max_empty_pages` empty pages in a row.
    pub fn is_exhausted(&self) -> bool {
        self.is_closed() || self.empty_page_count > self.max_empty_pages
    }
}

/// Issues and advances shard cursors against a change feed.
#[derive(Clone)]
pub struct ShardIterator {
    feed: Arc<dyn ChangeFeed>,
    decoder: Arc<RecordDecoder>,
    page_size: Option<u32>,
    max_empty_pages: u32,
}

impl ShardIterator {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        decoder: Arc<RecordDecoder>,
        page_size: Option<u32>,
        max_empty_pages: u32,
    ) -> Self {
        Self {
            feed,
            decoder,
            page_size,
            max_empty_pages,
        }
    }

    /// Request an iterator token and wrap it in a fresh cursor.
    pub async fn open(
        &self,
        stream_id: &str,
        shard_id: &str,
        iterator_type: ShardIteratorType,
    ) -> Result<ShardCursor> {
        let token = self
            .feed
            .get_shard_iterator(stream_id, shard_id, iterator_type)
            .await
            .map_err(|e| SyncError::IteratorCreationFailed {
                stream: stream_id.to_string(),
                shard: shard_id.to_string(),
                message: e.to_string(),
            })?;

        debug!(
            stream = %stream_id,
            shard = %shard_id,
            iterator_type = %iterator_type,
            "Opened shard iterator"
        );

        Ok(ShardCursor {
            stream_id: stream_id.to_string(),
            shard_id: shard_id.to_string(),
            iterator_type,
            iterator_token: Some(token),
            empty_page_count: 0,
            max_empty_pages: self.max_empty_pages,
            pages_fetched: 0,
            records_seen: 0,
        })
    }

    /// Fetch and decode the next page, advancing the cursor.
    ///
    /// Records that fail to decode are logged and dropped. A page with no
    /// decoded events counts towards the empty-page limit; any event resets it.
    /// On a closed cursor this returns an empty page without calling the feed.
    /// A failed fetch leaves the cursor untouched.
    pub async fn fetch_page(&self, cursor: &mut ShardCursor) -> Result<Vec<ChangeEvent>> {
        let Some(token) = cursor.iterator_token.as_deref() else {
            return Ok(Vec::new());
        };

        let page = self
            .feed
            .get_records(token, self.page_size)
            .await
            .map_err(|source| SyncError::FetchFailed {
                shard: cursor.shard_id.clone(),
                source,
            })?;

        cursor.pages_fetched += 1;
        cursor.records_seen += page.records.len() as u64;
        cursor.iterator_token = page.next_iterator.filter(|t| !t.is_empty());

        let mut events = Vec::with_capacity(page.records.len());
        for record in &page.records {
            match self.decoder.decode(record) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        shard = %cursor.shard_id,
                        sequence_number = %record.dynamodb.sequence_number,
                        error = %e,
                        "Dropping undecodable record"
                    );
                }
            }
        }

        if events.is_empty() {
            cursor.empty_page_count = cursor.empty_page_count.saturating_add(1);
        } else {
            cursor.empty_page_count = 0;
        }

        debug!(
            shard = %cursor.shard_id,
            records = page.records.len(),
            events = events.len(),
            empty_pages = cursor.empty_page_count,
            closed = cursor.is_closed(),
            "Fetched shard page"
        );

        Ok(events)
    }
}
