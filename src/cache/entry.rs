//! Cache Entry Module
//!
//! Defines per-key state: the last settled value or error, the fetch status,
//! the registered producer and the ordered subscriber list.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::cache::producer::SharedProducer;

// == Entry Status ==
/// Fetch lifecycle of a single key.
///
/// Transitions: `Idle -> Pending -> {Resolved, Rejected}`, and
/// `{Resolved, Rejected} -> Pending` only through a refetch or invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStatus {
    /// Created, never fetched
    Idle,
    /// A producer invocation is in flight
    Pending,
    /// The last fetch produced a value
    Resolved,
    /// The last fetch failed
    Rejected,
}

impl EntryStatus {
    /// True once a fetch cycle has ended, successfully or not.
    pub fn is_settled(self) -> bool {
        matches!(self, EntryStatus::Resolved | EntryStatus::Rejected)
    }
}

// == Subscriber ==
/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Callback invoked with the entry state after every settlement.
pub type Callback<T, E> = Arc<dyn Fn(&EntrySnapshot<T, E>) + Send + Sync>;

pub(crate) struct Subscriber<T, E> {
    pub(crate) id: SubscriberId,
    /// Cleared on unsubscribe, checked right before each invocation
    pub(crate) active: Arc<AtomicBool>,
    pub(crate) callback: Callback<T, E>,
}

impl<T, E> Clone for Subscriber<T, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            active: Arc::clone(&self.active),
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T, E> Subscriber<T, E> {
    /// Invokes the callback unless the subscription was cancelled.
    pub(crate) fn deliver(&self, snapshot: &EntrySnapshot<T, E>) {
        if self.active.load(Ordering::Acquire) {
            (self.callback)(snapshot);
        }
    }
}

// == Entry Snapshot ==
/// Read-only copy of an entry's observable state.
#[derive(Debug)]
pub struct EntrySnapshot<T, E> {
    /// Last resolved value; kept across rejections and revalidations
    pub value: Option<Arc<T>>,
    /// Last producer failure; cleared by the next successful fetch
    pub error: Option<Arc<E>>,
    /// Current fetch status
    pub status: EntryStatus,
    /// Set by invalidation, cleared when the following fetch settles
    pub stale: bool,
    /// Number of fetch cycles started for this key
    pub generation: u64,
    /// The last fetch cycle ended without settling (aborted or panicked)
    pub interrupted: bool,
}

impl<T, E> Clone for EntrySnapshot<T, E> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            error: self.error.clone(),
            status: self.status,
            stale: self.stale,
            generation: self.generation,
            interrupted: self.interrupted,
        }
    }
}

impl<T, E> EntrySnapshot<T, E> {
    /// True while a fetch is in flight and no value is available yet.
    pub fn is_loading(&self) -> bool {
        self.status == EntryStatus::Pending && self.value.is_none()
    }

    /// True while any fetch is in flight.
    pub fn is_validating(&self) -> bool {
        self.status == EntryStatus::Pending
    }
}

// == Cache Entry ==
/// Per-key state owned exclusively by the cache.
pub(crate) struct CacheEntry<K, T, E> {
    pub(crate) value: Option<Arc<T>>,
    pub(crate) error: Option<Arc<E>>,
    pub(crate) status: EntryStatus,
    pub(crate) stale: bool,
    pub(crate) generation: u64,
    pub(crate) interrupted: bool,
    /// When the latest fetch cycle started
    pub(crate) fetched_at: Option<Instant>,
    pub(crate) in_flight: Option<AbortHandle>,
    pub(crate) producer: Option<SharedProducer<K, T, E>>,
    pub(crate) subscribers: Vec<Subscriber<T, E>>,
}

impl<K, T, E> CacheEntry<K, T, E> {
    // == Constructor ==
    /// Creates an Idle entry with no producer and no subscribers.
    pub(crate) fn new() -> Self {
        Self {
            value: None,
            error: None,
            status: EntryStatus::Idle,
            stale: false,
            generation: 0,
            interrupted: false,
            fetched_at: None,
            in_flight: None,
            producer: None,
            subscribers: Vec::new(),
        }
    }

    // == Snapshot ==
    pub(crate) fn snapshot(&self) -> EntrySnapshot<T, E> {
        EntrySnapshot {
            value: self.value.clone(),
            error: self.error.clone(),
            status: self.status,
            stale: self.stale,
            generation: self.generation,
            interrupted: self.interrupted,
        }
    }

    // == Begin Fetch ==
    /// Moves the entry to Pending and returns the new generation.
    ///
    /// Callers must have checked that the entry is not already Pending.
    pub(crate) fn begin_fetch(&mut self) -> u64 {
        debug_assert_ne!(self.status, EntryStatus::Pending);
        self.status = EntryStatus::Pending;
        self.interrupted = false;
        self.fetched_at = Some(Instant::now());
        self.generation += 1;
        self.generation
    }

    // == Settle ==
    /// Stores the outcome of the fetch cycle `generation`.
    ///
    /// Returns false when the outcome belongs to an older cycle and was dropped.
    pub(crate) fn settle(&mut self, generation: u64, outcome: Result<T, E>) -> bool {
        if generation != self.generation || self.status != EntryStatus::Pending {
            return false;
        }

        match outcome {
            Ok(value) => {
                self.value = Some(Arc::new(value));
                self.error = None;
                self.status = EntryStatus::Resolved;
            }
            Err(error) => {
                self.error = Some(Arc::new(error));
                self.status = EntryStatus::Rejected;
            }
        }
        self.stale = false;
        self.in_flight = None;
        true
    }

    // == Interrupt ==
    /// Ends the fetch cycle `generation` without an outcome.
    ///
    /// The entry goes back to the status its stored value and error imply,
    /// or Idle if it never settled. Returns false when the cycle already
    /// settled or was superseded.
    pub(crate) fn interrupt(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.status != EntryStatus::Pending {
            return false;
        }

        self.status = match (&self.value, &self.error) {
            (_, Some(_)) => EntryStatus::Rejected,
            (Some(_), None) => EntryStatus::Resolved,
            (None, None) => EntryStatus::Idle,
        };
        self.interrupted = true;
        self.in_flight = None;
        true
    }

    /// Whether a fetch cycle started at least `window` ago, or never.
    pub(crate) fn fetched_before(&self, window: std::time::Duration) -> bool {
        self.fetched_at.map_or(true, |at| at.elapsed() >= window)
    }

    /// Subscribers still registered, in subscription order.
    pub(crate) fn active_subscribers(&self) -> Vec<Subscriber<T, E>> {
        self.subscribers
            .iter()
            .filter(|s| s.active.load(Ordering::Acquire))
            .cloned()
            .collect()
    }
}
