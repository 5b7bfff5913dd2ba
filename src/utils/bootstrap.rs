//! Bootstrap utilities for the marker-sync binary.

use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;

const MAX_ATTEMPTS: u32 = 10;
const INITIAL_DELAY: Duration = Duration::from_millis(200);
const MAX_DELAY: Duration = Duration::from_secs(5);

/// Initialize tracing with the MARKER_SYNC_LOG environment variable.
///
/// Defaults to "info" level if MARKER_SYNC_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run a startup step with exponential backoff.
///
/// Used for steps that must succeed before the consumer starts, such as the
/// initial load from a store that may still be coming up.
pub async fn with_retry<T, E, F, Fut>(operation: &str, attempt_fn: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    with_retry_policy(operation, MAX_ATTEMPTS, INITIAL_DELAY, attempt_fn).await
}

async fn with_retry_policy<T, E, F, Fut>(
    operation: &str,
    max_attempts: u32,
    initial_delay: Duration,
    attempt_fn: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match attempt_fn().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = %operation, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < max_attempts => {
                warn!(
                    operation = %operation,
                    attempt,
                    max_attempts,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Startup step failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, MAX_DELAY);
            }
            Err(e) => {
                error!(operation = %operation, attempts = attempt, error = %e, "Startup step failed");
                return Err(e);
            }
        }
    }
}
