//! Non-blocking binding: always returns immediately with the loading state.

use std::sync::Arc;

use tracing::trace;

use crate::binding::{log_settlement, Binding, Rerender};
use crate::cache::{AsyncProducer, CacheKey, EntrySnapshot, KeyedAsyncCache, SubscriptionHandle};
use crate::error::Result;

/// What a non-blocking consumer sees: branch on `error` and `is_loading`
/// before touching `value`.
#[derive(Debug)]
pub struct LoadingState<T, E> {
    pub value: Option<Arc<T>>,
    pub error: Option<Arc<E>>,
    /// A fetch is in flight and there is no value yet
    pub is_loading: bool,
    /// A fetch is in flight
    pub is_validating: bool,
}

impl<T, E> Clone for LoadingState<T, E> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
            is_validating: self.is_validating,
        }
    }
}

impl<T, E> From<EntrySnapshot<T, E>> for LoadingState<T, E> {
    fn from(snapshot: EntrySnapshot<T, E>) -> Self {
        Self {
            is_loading: snapshot.is_loading(),
            is_validating: snapshot.is_validating(),
            value: snapshot.value,
            error: snapshot.error,
        }
    }
}

// == Loading Binding ==
pub struct LoadingBinding<K, T, E> {
    cache: KeyedAsyncCache<K, T, E>,
    key: K,
    _subscription: SubscriptionHandle,
}

impl<K, T, E> Binding<K, T, E> for LoadingBinding<K, T, E>
where
    K: CacheKey,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    type Output = LoadingState<T, E>;

    fn bind<P>(
        cache: &KeyedAsyncCache<K, T, E>,
        key: K,
        producer: P,
        rerender: Rerender,
    ) -> Result<Self>
    where
        P: AsyncProducer<K, T, E>,
    {
        let bound_key = key.clone();
        let subscription = cache.subscribe(key.clone(), move |snapshot| {
            log_settlement(&bound_key, snapshot);
            rerender();
        });
        cache.ensure(key.clone(), producer)?;
        trace!(key = ?key, "loading binding mounted");

        Ok(Self {
            cache: cache.clone(),
            key,
            _subscription: subscription,
        })
    }

    fn key(&self) -> &K {
        &self.key
    }

    fn evaluate(&self) -> LoadingState<T, E> {
        self.cache.get(&self.key).into()
    }
}
