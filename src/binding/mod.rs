//! Binding Module
//!
//! Couples a consumer to one cache key. Two variants share the [`Binding`]
//! trait and are picked when binding:
//! - [`SuspenseBinding`]: evaluation suspends until the key has settled
//! - [`LoadingBinding`]: evaluation never suspends and reports loading state
//!
//! [`SuspenseBoundary`] runs views made of several suspense bindings and
//! re-runs them whenever any bound key settles.

mod boundary;
mod loading;
mod suspense;

use std::fmt::Debug;
use std::sync::Arc;

use tracing::debug;

use crate::cache::{AsyncProducer, EntrySnapshot, EntryStatus, KeyedAsyncCache};
use crate::error::Result;

pub use boundary::{RenderCx, RenderOutcome, SuspenseBoundary};
pub use loading::{LoadingBinding, LoadingState};
pub use suspense::{Suspend, SuspenseBinding};

/// Re-render trigger supplied by the host; invoked after every settlement
/// of the bound key.
pub type Rerender = Arc<dyn Fn() + Send + Sync>;

/// A rerender trigger that does nothing.
pub fn no_rerender() -> Rerender {
    Arc::new(|| {})
}

/// Reports the outcome a binding was notified about.
pub(crate) fn log_settlement<K: Debug, T, E>(key: &K, snapshot: &EntrySnapshot<T, E>) {
    match snapshot.status {
        EntryStatus::Resolved => debug!(key = ?key, "data fetched"),
        EntryStatus::Rejected => debug!(key = ?key, "fetch failed"),
        _ if snapshot.interrupted => debug!(key = ?key, "fetch interrupted"),
        _ => {}
    }
}

// == Binding ==
/// Subscription capability shared by both binding variants.
///
/// Binding subscribes to the key and starts the first fetch if the key is
/// Idle. Dropping the binding unsubscribes, on every exit path.
pub trait Binding<K, T, E>: Sized {
    /// What one evaluation hands to the consumer.
    type Output;

    /// Subscribes to `key`, registering `producer` as its producer.
    fn bind<P>(
        cache: &KeyedAsyncCache<K, T, E>,
        key: K,
        producer: P,
        rerender: Rerender,
    ) -> Result<Self>
    where
        P: AsyncProducer<K, T, E>;

    /// The bound key.
    fn key(&self) -> &K;

    /// Reads the current state of the bound key.
    fn evaluate(&self) -> Self::Output;
}
