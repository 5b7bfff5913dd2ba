//! Replay and live listening over a table's change feed.
//!
//! [`StreamConsumer::replay`] walks every shard of every stream from
//! `TRIM_HORIZON` and terminates on its own. [`StreamConsumer::start_listening`]
//! spawns a periodic task that polls the first shard of the first stream from
//! `LATEST`. Failures are scoped to one shard or one cycle: they are logged
//! and the next cycle retries. The listen cursor survives transient fetch
//! failures so records written during an outage are still delivered.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{AttributeNames, StreamConfig, DEFAULT_POLL_INTERVAL_SECS};
use crate::decoder::RecordDecoder;
use crate::discovery::Discovery;
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::{Result, SyncError};
use crate::interfaces::{ChangeFeed, ShardIteratorType};
use crate::model::Classification;
use crate::shard::{ShardCursor, ShardIterator};

/// Listen toggle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenState {
    Idle,
    Listening,
}

/// Counters from a replay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub streams: usize,
    pub shards: usize,
    /// Streams or shards abandoned after a discovery, iterator or fetch failure.
    pub failures: usize,
    pub pages: u64,
    /// Decoded events inside the window.
    pub dispatched: usize,
    /// Decoded events older than the window.
    pub filtered: usize,
}

impl ReplayStats {
    fn absorb(&mut self, other: ReplayStats) {
        self.streams += other.streams;
        self.shards += other.shards;
        self.failures += other.failures;
        self.pages += other.pages;
        self.dispatched += other.dispatched;
        self.filtered += other.filtered;
    }
}

/// Counters from a bulk load.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    pub rows: usize,
    pub created: usize,
    pub skipped: usize,
}

struct Listener {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Listener {
    async fn stop(self) {
        let _ = self.cancel.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Listen task ended abnormally");
        }
    }
}

/// State shared with the listen task.
struct ConsumerCore {
    config: StreamConfig,
    discovery: Discovery,
    shards: ShardIterator,
    dispatcher: Dispatcher,
    /// `LATEST` cursor carried between listen ticks.
    listen_cursor: Mutex<Option<ShardCursor>>,
}

/// Replays and follows a table's change feed into the entity registry.
pub struct StreamConsumer {
    core: Arc<ConsumerCore>,
    listener: Mutex<Option<Listener>>,
}

impl StreamConsumer {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        dispatcher: Dispatcher,
        config: StreamConfig,
        attributes: AttributeNames,
    ) -> Self {
        let decoder = Arc::new(RecordDecoder::new(attributes));
        let shards = ShardIterator::new(
            feed.clone(),
            decoder,
            config.page_size,
            config.max_empty_pages,
        );
        Self {
            core: Arc::new(ConsumerCore {
                config,
                discovery: Discovery::new(feed),
                shards,
                dispatcher,
                listen_cursor: Mutex::new(None),
            }),
            listener: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.core.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.core.dispatcher
    }

    /// Dispatch every event of `table` captured at or after `since`.
    ///
    /// Shards of a stream are read concurrently, each one sequentially from
    /// `TRIM_HORIZON` until exhausted.
    pub async fn replay(&self, table: &str, since: DateTime<Utc>) -> ReplayStats {
        let mut stats = ReplayStats::default();
        let streams = match self.core.discovery.list_streams(table).await {
            Ok(streams) => streams,
            Err(e) => {
                warn!(table = %table, error = %e, "Replay skipped");
                stats.failures += 1;
                return stats;
            }
        };

        for stream_id in &streams {
            stats.streams += 1;
            let shard_ids = match self.core.discovery.list_shards(stream_id).await {
                Ok(shard_ids) => shard_ids,
                Err(e) => {
                    warn!(stream = %stream_id, error = %e, "Skipping stream");
                    stats.failures += 1;
                    continue;
                }
            };

            let results = join_all(
                shard_ids
                    .iter()
                    .map(|shard_id| self.core.replay_shard(stream_id, shard_id, since)),
            )
            .await;
            for shard_stats in results {
                stats.absorb(shard_stats);
            }
        }

        info!(
            table = %table,
            since = %since,
            streams = stats.streams,
            shards = stats.shards,
            dispatched = stats.dispatched,
            filtered = stats.filtered,
            failures = stats.failures,
            "Replay complete"
        );
        stats
    }

    /// Replay the configured table over the configured window.
    pub async fn replay_recent(&self) -> ReplayStats {
        let since = Utc::now() - self.core.config.replay_window();
        self.replay(&self.core.config.table_name, since).await
    }

    /// Run one listen cycle by hand. Returns the number of events dispatched.
    pub async fn listen_once(&self, table: &str) -> Result<usize> {
        self.core.listen_cycle(table, None).await
    }

    /// Toggle listening on `table`.
    ///
    /// From Idle this spawns a task polling every `interval`. From Listening
    /// it stops the running task instead, so a second call undoes the first.
    /// A zero interval falls back to the default poll interval.
    pub async fn start_listening(&self, table: &str, interval: Duration) -> ListenState {
        let mut listener = self.listener.lock().await;
        if let Some(active) = listener.take() {
            active.stop().await;
            info!(table = %table, "Stopped listening");
            return ListenState::Idle;
        }

        let interval = if interval.is_zero() {
            let fallback = Duration::from_secs_f64(DEFAULT_POLL_INTERVAL_SECS);
            warn!(
                table = %table,
                fallback_ms = fallback.as_millis() as u64,
                "Zero listen interval, using default"
            );
            fallback
        } else {
            interval
        };

        *self.core.listen_cursor.lock().await = None;
        *listener = Some(self.spawn_listener(table.to_string(), interval));
        info!(table = %table, interval_ms = interval.as_millis() as u64, "Started listening");
        ListenState::Listening
    }

    /// Stop listening and wait for the task to finish its current page.
    /// Does nothing when Idle.
    pub async fn stop_listening(&self) -> ListenState {
        if let Some(active) = self.listener.lock().await.take() {
            active.stop().await;
            info!("Stopped listening");
        }
        ListenState::Idle
    }

    pub async fn listen_state(&self) -> ListenState {
        if self.listener.lock().await.is_some() {
            ListenState::Listening
        } else {
            ListenState::Idle
        }
    }

    pub async fn is_listening(&self) -> bool {
        self.listen_state().await == ListenState::Listening
    }

    /// Register every row of the entity store without writing anything back.
    ///
    /// With `static_only`, Dynamic rows are skipped.
    pub async fn load_all(&self, static_only: bool) -> Result<LoadStats> {
        let store = self.core.dispatcher.store().ok_or(SyncError::NoStore)?;
        let rows = store.scan().await?;

        let mut stats = LoadStats {
            rows: rows.len(),
            ..Default::default()
        };
        for row in &rows {
            if static_only && row.classification == Classification::Dynamic {
                stats.skipped += 1;
                continue;
            }
            if self.core.dispatcher.apply(row).await == DispatchOutcome::Created {
                stats.created += 1;
            }
        }

        info!(
            rows = stats.rows,
            created = stats.created,
            skipped = stats.skipped,
            static_only,
            "Loaded markers from store"
        );
        Ok(stats)
    }

    fn spawn_listener(&self, table: String, interval: Duration) -> Listener {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let cycle_cancel = cancel_rx.clone();
        let core = Arc::clone(&self.core);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match core.listen_cycle(&table, Some(&cycle_cancel)).await {
                            Ok(0) => {}
                            Ok(count) => debug!(table = %table, count, "Listen cycle dispatched events"),
                            Err(e) => warn!(table = %table, error = %e, "Listen cycle failed"),
                        }
                    }
                    _ = cancel_rx.changed() => {
                        debug!(table = %table, "Listen task shutting down");
                        break;
                    }
                }
            }
        });

        Listener {
            cancel: cancel_tx,
            handle,
        }
    }
}

impl Drop for StreamConsumer {
    fn drop(&mut self) {
        if let Some(active) = self.listener.get_mut().take() {
            let _ = active.cancel.send(true);
        }
    }
}

impl ConsumerCore {
    async fn replay_shard(&self, stream_id: &str, shard_id: &str, since: DateTime<Utc>) -> ReplayStats {
        let mut stats = ReplayStats {
            shards: 1,
            ..Default::default()
        };
        let mut cursor = match self
            .shards
            .open(stream_id, shard_id, ShardIteratorType::TrimHorizon)
            .await
        {
            Ok(cursor) => cursor,
            Err(e) => {
                warn!(stream = %stream_id, shard = %shard_id, error = %e, "Skipping shard");
                stats.failures = 1;
                return stats;
            }
        };

        while !cursor.is_exhausted() {
            let events = match self.shards.fetch_page(&mut cursor).await {
                Ok(events) => events,
                Err(e) => {
                    warn!(shard = %shard_id, error = %e, "Abandoning shard for this replay");
                    stats.failures = 1;
                    break;
                }
            };
            for event in &events {
                if event.approx_capture_time < since {
                    stats.filtered += 1;
                    continue;
                }
                self.dispatcher.dispatch(event).await;
                stats.dispatched += 1;
            }
        }

        stats.pages = cursor.pages_fetched;
        debug!(
            shard = %shard_id,
            pages = cursor.pages_fetched,
            records = cursor.records_seen,
            closed = cursor.is_closed(),
            "Shard replayed"
        );
        stats
    }

    /// Poll the first shard of the first stream from its `LATEST` cursor.
    ///
    /// Every cycle fetches at least one page and keeps going while the cursor
    /// is not exhausted. The empty-page count carries over between cycles, so
    /// an idle shard costs one GetRecords call per cycle.
    ///
    /// The cursor is dropped when the shard closes or the feed rejects the
    /// iterator; the next cycle then discovers again. Any other fetch failure
    /// keeps the cursor and the next cycle retries from the same position.
    async fn listen_cycle(&self, table: &str, cancel: Option<&watch::Receiver<bool>>) -> Result<usize> {
        let mut slot = self.listen_cursor.lock().await;

        if slot.is_none() {
            let Some((stream_id, shard_id)) = self.discovery.first_shard(table).await? else {
                debug!(table = %table, "No stream or shard to listen on yet");
                return Ok(0);
            };
            let cursor = self
                .shards
                .open(&stream_id, &shard_id, ShardIteratorType::Latest)
                .await?;
            *slot = Some(cursor);
        }
        let Some(cursor) = slot.as_mut() else {
            return Ok(0);
        };

        let mut dispatched = 0;
        loop {
            if cancel.is_some_and(|rx| *rx.borrow()) {
                break;
            }
            let events = match self.shards.fetch_page(cursor).await {
                Ok(events) => events,
                Err(e) => {
                    if e.invalidates_cursor() {
                        info!(shard = %cursor.shard_id, "Listen iterator rejected, rediscovering next cycle");
                        *slot = None;
                    }
                    return Err(e);
                }
            };
            for event in &events {
                self.dispatcher.dispatch(event).await;
                dispatched += 1;
            }
            if cursor.is_exhausted() {
                break;
            }
        }

        if cursor.is_closed() {
            info!(shard = %cursor.shard_id, "Listened shard closed");
            *slot = None;
        }
        Ok(dispatched)
    }
}
