//! Change feed polling configuration.

use std::time::Duration;

use serde::Deserialize;

/// Default seconds between live polls.
pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 2.0;
/// Default consecutive empty pages tolerated before a shard counts as drained.
pub const DEFAULT_MAX_EMPTY_PAGES: u32 = 5;
/// Default replay window. DynamoDB Streams retain records for 24 hours.
pub const DEFAULT_REPLAY_WINDOW_HOURS: u64 = 24;

/// Stream consumer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Table whose streams are consumed.
    pub table_name: String,
    /// Seconds between live polls.
    pub poll_interval_secs: f64,
    /// Empty pages in a row after which a shard is treated as drained.
    pub max_empty_pages: u32,
    /// How far back `replay_recent` reaches.
    pub replay_window_hours: u64,
    /// Records per GetRecords call. `None` uses the feed default.
    pub page_size: Option<u32>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            table_name: "markers".to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_empty_pages: DEFAULT_MAX_EMPTY_PAGES,
            replay_window_hours: DEFAULT_REPLAY_WINDOW_HOURS,
            page_size: None,
        }
    }
}

impl StreamConfig {
    pub fn with_table(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    /// Poll interval as a `Duration`, falling back to the default for unusable values.
    pub fn poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.poll_interval_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_POLL_INTERVAL_SECS))
    }

    pub fn replay_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.replay_window_hours as i64)
    }
}
