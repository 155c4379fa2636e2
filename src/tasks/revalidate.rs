//! Revalidation Task
//!
//! Background task that periodically invalidates one key, keeping it fresh
//! without any consumer asking.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, KeyedAsyncCache};
use crate::error::SwrError;

/// Spawns a background task that invalidates `key` every `interval`.
///
/// Until a consumer has registered a producer for `key` the invalidation is
/// skipped and retried on the next tick. Invalidating while a fetch is in
/// flight does not start a second one.
///
/// # Arguments
/// * `cache` - Cache holding the key
/// * `key` - Key to revalidate
/// * `interval` - Time between invalidations
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_revalidate_task(state.time.clone(), "time".to_string(), Duration::from_secs(10));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_revalidate_task<K, T, E>(
    cache: KeyedAsyncCache<K, T, E>,
    key: K,
    interval: Duration,
) -> JoinHandle<()>
where
    K: CacheKey,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(key = ?key, interval_ms = interval.as_millis() as u64, "Starting revalidation task");

        loop {
            tokio::time::sleep(interval).await;

            match cache.invalidate(&key) {
                Ok(()) => debug!(key = ?key, "revalidation triggered"),
                Err(SwrError::UnknownKey(_)) => {
                    debug!(key = ?key, "revalidation skipped: no producer registered yet")
                }
                Err(error) => warn!(key = ?key, error = %error, "revalidation failed"),
            }
        }
    })
}
