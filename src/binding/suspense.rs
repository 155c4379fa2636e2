//! Blocking binding: evaluation suspends until the bound key has settled.

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::trace;

use crate::binding::{log_settlement, Binding, Rerender};
use crate::cache::{AsyncProducer, CacheKey, EntryStatus, KeyedAsyncCache, SubscriptionHandle};
use crate::error::{Result, SwrError};

/// Why an evaluation could not produce a value.
#[derive(Debug, Clone)]
pub enum Suspend {
    /// Not settled yet; pause the consumer and evaluate again later
    Pending,
    /// Settled with a failure, to be handled by the consumer's boundary
    Failed(SwrError),
}

impl From<SwrError> for Suspend {
    fn from(error: SwrError) -> Self {
        Suspend::Failed(error)
    }
}

// == Suspense Binding ==
/// Blocking binding. A resolved key yields its value directly, so consumer
/// code can assume presence.
pub struct SuspenseBinding<K, T, E> {
    cache: KeyedAsyncCache<K, T, E>,
    key: K,
    settled: Arc<Notify>,
    _subscription: SubscriptionHandle,
}

impl<K, T, E> SuspenseBinding<K, T, E>
where
    K: CacheKey,
    T: Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    // == Resolve ==
    /// Waits until the key has a value or a failure.
    ///
    /// A producer failure is returned as [`SwrError::Producer`].
    pub async fn resolve(&self) -> Result<Arc<T>> {
        loop {
            match self.evaluate() {
                Ok(value) => return Ok(value),
                Err(Suspend::Failed(error)) => return Err(error),
                // A settlement racing with this check leaves a permit behind
                Err(Suspend::Pending) => self.settled.notified().await,
            }
        }
    }
}

impl<K, T, E> Binding<K, T, E> for SuspenseBinding<K, T, E>
where
    K: CacheKey,
    T: Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Output = std::result::Result<Arc<T>, Suspend>;

    fn bind<P>(
        cache: &KeyedAsyncCache<K, T, E>,
        key: K,
        producer: P,
        rerender: Rerender,
    ) -> Result<Self>
    where
        P: AsyncProducer<K, T, E>,
    {
        let settled = Arc::new(Notify::new());
        let wake = Arc::clone(&settled);
        let bound_key = key.clone();
        let subscription = cache.subscribe(key.clone(), move |snapshot| {
            log_settlement(&bound_key, snapshot);
            wake.notify_one();
            rerender();
        });
        cache.ensure(key.clone(), producer)?;
        trace!(key = ?key, "suspense binding mounted");

        Ok(Self {
            cache: cache.clone(),
            key,
            settled,
            _subscription: subscription,
        })
    }

    fn key(&self) -> &K {
        &self.key
    }

    /// Value when resolved, the stale value while revalidating, otherwise
    /// `Suspend`. A key whose only fetch was interrupted fails with
    /// [`SwrError::Interrupted`] until a new fetch starts.
    fn evaluate(&self) -> std::result::Result<Arc<T>, Suspend> {
        let snapshot = self.cache.get(&self.key);
        match (snapshot.status, snapshot.error) {
            (EntryStatus::Rejected, Some(error)) => {
                Err(Suspend::Failed(SwrError::producer(&self.key, error)))
            }
            (status, _) => match snapshot.value {
                Some(value) => Ok(value),
                None if status == EntryStatus::Idle && snapshot.interrupted => Err(
                    Suspend::Failed(SwrError::Interrupted(format!("{:?}", self.key))),
                ),
                None => Err(Suspend::Pending),
            },
        }
    }
}
