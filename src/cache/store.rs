//! Cache Store Module
//!
//! The keyed async cache: one entry per key, at most one in-flight producer
//! call per key, subscriber notification on settlement and explicit
//! invalidation.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

use crate::cache::entry::{CacheEntry, Subscriber};
use crate::cache::producer::SharedProducer;
use crate::cache::{AsyncProducer, CacheStats, EntrySnapshot, EntryStatus, SubscriberId};
use crate::error::{Result, SwrError};

/// How long after a fetch started a newly mounted binding reuses its
/// result without revalidating.
pub const DEFAULT_DEDUPE_INTERVAL: Duration = Duration::from_secs(2);

/// Requirements on cache keys.
pub trait CacheKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<K> CacheKey for K where K: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

// == Cache Id ==
/// Identifies one cache instance, so keys from different caches never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheId(u64);

impl CacheId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for CacheId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cache-{}", self.0)
    }
}

struct State<K, T, E> {
    entries: HashMap<K, CacheEntry<K, T, E>>,
    stats: CacheStats,
}

struct Shared<K, T, E> {
    id: CacheId,
    dedupe_interval: Duration,
    /// Held only for short synchronous sections, never across an await
    state: Mutex<State<K, T, E>>,
}

impl<K, T, E> Shared<K, T, E> {
    fn lock(&self) -> MutexGuard<'_, State<K, T, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// == Subscription Handle ==
/// Token returned by [`KeyedAsyncCache::subscribe`].
///
/// Calling [`unsubscribe`](Self::unsubscribe) or dropping the handle removes
/// the callback. Once removed, the callback is never invoked again.
pub struct SubscriptionHandle {
    id: SubscriberId,
    active: Arc<AtomicBool>,
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl SubscriptionHandle {
    /// Identifier of this subscription.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Removes the callback from the entry.
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

// == Call On Drop ==
/// Runs a closure when dropped, also when the owning task unwinds or is
/// cancelled.
struct CallOnDrop {
    f: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl CallOnDrop {
    fn new<F: FnOnce() + Send + 'static>(f: F) -> Self {
        Self {
            f: Some(Box::new(f)),
        }
    }
}

impl Drop for CallOnDrop {
    fn drop(&mut self) {
        if let Some(f) = self.f.take() {
            f();
        }
    }
}

impl Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("active", &self.active.load(Ordering::Relaxed))
            .finish()
    }
}

// == Keyed Async Cache ==
/// Registry of cache entries keyed by `K`.
///
/// Cloning is cheap and yields another handle to the same cache. Entries are
/// created lazily and live as long as the cache.
pub struct KeyedAsyncCache<K, T, E> {
    shared: Arc<Shared<K, T, E>>,
}

impl<K, T, E> Clone for KeyedAsyncCache<K, T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, T, E> Debug for KeyedAsyncCache<K, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedAsyncCache")
            .field("id", &self.shared.id)
            .finish_non_exhaustive()
    }
}

impl<K, T, E> Default for KeyedAsyncCache<K, T, E>
where
    K: CacheKey,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T, E> KeyedAsyncCache<K, T, E>
where
    K: CacheKey,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty cache using [`DEFAULT_DEDUPE_INTERVAL`].
    pub fn new() -> Self {
        Self::with_dedupe_interval(DEFAULT_DEDUPE_INTERVAL)
    }

    /// Creates an empty cache whose bindings revalidate settled keys on
    /// mount once `dedupe_interval` has passed since the last fetch started.
    pub fn with_dedupe_interval(dedupe_interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: CacheId::next(),
                dedupe_interval,
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    stats: CacheStats::new(),
                }),
            }),
        }
    }

    /// Window within which [`ensure`](Self::ensure) reuses a settled value.
    pub fn dedupe_interval(&self) -> Duration {
        self.shared.dedupe_interval
    }

    /// Identifier of this cache instance.
    pub fn id(&self) -> CacheId {
        self.shared.id
    }

    // == Get ==
    /// Returns the state of `key`, creating an Idle entry if needed.
    ///
    /// Never starts a fetch.
    pub fn get(&self, key: &K) -> EntrySnapshot<T, E> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let snapshot = state
            .entries
            .entry(key.clone())
            .or_insert_with(CacheEntry::new)
            .snapshot();
        state.stats.set_total_entries(state.entries.len());
        snapshot
    }

    /// Returns the state of `key` if an entry exists.
    pub fn snapshot(&self, key: &K) -> Option<EntrySnapshot<T, E>> {
        self.shared.lock().entries.get(key).map(CacheEntry::snapshot)
    }

    // == Fetch ==
    /// Registers `producer` for `key` and starts a fetch unless one is in flight.
    ///
    /// Returns `Ok(true)` when a producer invocation was started and
    /// `Ok(false)` when the request was absorbed by the in-flight fetch.
    pub fn fetch<P>(&self, key: K, producer: P) -> Result<bool>
    where
        P: AsyncProducer<K, T, E>,
    {
        let producer: SharedProducer<K, T, E> = Arc::new(producer);
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        state
            .entries
            .entry(key.clone())
            .or_insert_with(CacheEntry::new)
            .producer = Some(producer);
        state.stats.set_total_entries(state.entries.len());
        self.start_fetch(state, &key)
    }

    // == Ensure ==
    /// Registers `producer` for `key` and fetches if the key needs it.
    ///
    /// This is what a consumer does on mount. An Idle key gets its first
    /// fetch. A settled key keeps serving its value and is revalidated in
    /// the background once the dedupe interval has passed since its last
    /// fetch started. A Pending key is left alone.
    pub fn ensure<P>(&self, key: K, producer: P) -> Result<bool>
    where
        P: AsyncProducer<K, T, E>,
    {
        let producer: SharedProducer<K, T, E> = Arc::new(producer);
        let window = self.shared.dedupe_interval;
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let entry = state.entries.entry(key.clone()).or_insert_with(CacheEntry::new);
        entry.producer = Some(producer);
        let needs_fetch = match entry.status {
            EntryStatus::Idle => true,
            EntryStatus::Pending => false,
            EntryStatus::Resolved | EntryStatus::Rejected => {
                let expired = entry.fetched_before(window);
                if expired {
                    debug!(key = ?key, "revalidating on mount");
                }
                expired
            }
        };
        state.stats.set_total_entries(state.entries.len());

        if needs_fetch {
            self.start_fetch(state, &key)
        } else {
            Ok(false)
        }
    }

    // == Revalidate ==
    /// Starts a fetch with the producer last registered for `key`.
    pub fn revalidate(&self, key: &K) -> Result<bool> {
        let mut guard = self.shared.lock();
        self.start_fetch(&mut guard, key)
    }

    // == Invalidate ==
    /// Marks `key` stale and refetches it with its registered producer.
    ///
    /// The current value and error stay visible until the new fetch settles.
    /// While a fetch is already in flight this only marks the entry stale.
    pub fn invalidate(&self, key: &K) -> Result<()> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;

        let entry = state
            .entries
            .get_mut(key)
            .filter(|entry| entry.producer.is_some())
            .ok_or_else(|| SwrError::unknown_key(key))?;
        entry.stale = true;
        state.stats.record_invalidation();
        debug!(key = ?key, "invalidated");

        self.start_fetch(state, key).map(|_| ())
    }

    // == Subscribe ==
    /// Registers `callback` to run after every settlement of `key`.
    ///
    /// Callbacks for one key run in subscription order, on the task that
    /// settled the fetch, with no cache lock held.
    pub fn subscribe<F>(&self, key: K, callback: F) -> SubscriptionHandle
    where
        F: Fn(&EntrySnapshot<T, E>) + Send + Sync + 'static,
    {
        let id = SubscriberId::next();
        let active = Arc::new(AtomicBool::new(true));
        {
            let mut guard = self.shared.lock();
            let state = &mut *guard;
            state
                .entries
                .entry(key.clone())
                .or_insert_with(CacheEntry::new)
                .subscribers
                .push(Subscriber {
                    id,
                    active: Arc::clone(&active),
                    callback: Arc::new(callback),
                });
            state.stats.set_total_entries(state.entries.len());
        }
        trace!(key = ?key, subscriber = %id, "subscribed");

        let cache = Arc::downgrade(&self.shared);
        SubscriptionHandle {
            id,
            active,
            remove: Some(Box::new(move || remove_subscriber(&cache, &key, id))),
        }
    }

    /// Number of live subscriptions for `key`.
    pub fn subscriber_count(&self, key: &K) -> usize {
        self.shared
            .lock()
            .entries
            .get(key)
            .map(|entry| entry.subscribers.len())
            .unwrap_or(0)
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.shared.lock();
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.entries.len());
        stats
    }

    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.shared.lock().entries.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.shared.lock().entries.is_empty()
    }

    // == Abort In Flight ==
    /// Aborts every running producer task. Used on shutdown.
    ///
    /// Each aborted entry goes back to its last settled status, or Idle if it
    /// never settled, and its subscribers are notified so waiting consumers
    /// re-evaluate. Returns how many tasks were aborted.
    pub fn abort_in_flight(&self) -> usize {
        let mut notifications = Vec::new();
        let mut aborted = 0;
        {
            let mut guard = self.shared.lock();
            let state = &mut *guard;
            for (key, entry) in state.entries.iter_mut() {
                let Some(task) = entry.in_flight.take() else {
                    continue;
                };
                task.abort();
                aborted += 1;
                if entry.interrupt(entry.generation) {
                    state.stats.record_interrupted();
                    warn!(key = ?key, generation = entry.generation, "fetch aborted");
                    notifications.push((entry.active_subscribers(), entry.snapshot()));
                }
            }
        }

        for (subscribers, snapshot) in &notifications {
            for subscriber in subscribers {
                subscriber.deliver(snapshot);
            }
        }
        aborted
    }

    /// Starts a fetch for `key` under the caller's lock.
    ///
    /// The Pending check and the transition happen in the same critical
    /// section, which is what keeps a single fetch in flight per key.
    fn start_fetch(&self, state: &mut State<K, T, E>, key: &K) -> Result<bool> {
        let entry = state
            .entries
            .get_mut(key)
            .ok_or_else(|| SwrError::unknown_key(key))?;

        if entry.status == EntryStatus::Pending {
            state.stats.record_dedup();
            trace!(key = ?key, generation = entry.generation, "fetch already in flight");
            return Ok(false);
        }

        let producer = entry
            .producer
            .clone()
            .ok_or_else(|| SwrError::unknown_key(key))?;
        let runtime = Handle::try_current().map_err(|e| SwrError::NoRuntime(e.to_string()))?;

        let generation = entry.begin_fetch();
        let cache = Arc::downgrade(&self.shared);
        let task_key = key.clone();
        let task = runtime.spawn(async move {
            // No-op once the cycle settled; otherwise the producer panicked or
            // the task was cancelled
            let _interrupt_token = CallOnDrop::new({
                let cache = cache.clone();
                let key = task_key.clone();
                move || {
                    if let Some(shared) = cache.upgrade() {
                        KeyedAsyncCache { shared }.interrupt(&key, generation);
                    }
                }
            });

            let outcome = producer.produce(task_key.clone()).await;
            if let Some(shared) = cache.upgrade() {
                KeyedAsyncCache { shared }.settle(task_key, generation, outcome);
            }
        });
        entry.in_flight = Some(task.abort_handle());
        state.stats.record_fetch();

        debug!(key = ?key, generation, "fetch started");
        Ok(true)
    }

    /// Stores a fetch outcome and notifies subscribers in subscription order.
    fn settle(&self, key: K, generation: u64, outcome: std::result::Result<T, E>) {
        let resolved = outcome.is_ok();
        let (subscribers, snapshot) = {
            let mut guard = self.shared.lock();
            let state = &mut *guard;
            let Some(entry) = state.entries.get_mut(&key) else {
                return;
            };
            if !entry.settle(generation, outcome) {
                trace!(key = ?key, generation, "dropped outdated settlement");
                return;
            }
            if resolved {
                state.stats.record_resolved();
            } else {
                state.stats.record_rejected();
            }
            (entry.active_subscribers(), entry.snapshot())
        };

        debug!(
            key = ?key,
            generation,
            status = ?snapshot.status,
            subscribers = subscribers.len(),
            "fetch settled"
        );

        for subscriber in &subscribers {
            subscriber.deliver(&snapshot);
        }
    }

    /// Ends the fetch cycle `generation` of `key` without an outcome and
    /// notifies subscribers. Does nothing if the cycle already ended.
    fn interrupt(&self, key: &K, generation: u64) {
        let (subscribers, snapshot) = {
            let mut guard = self.shared.lock();
            let state = &mut *guard;
            let Some(entry) = state.entries.get_mut(key) else {
                return;
            };
            if !entry.interrupt(generation) {
                return;
            }
            state.stats.record_interrupted();
            (entry.active_subscribers(), entry.snapshot())
        };

        warn!(
            key = ?key,
            generation,
            status = ?snapshot.status,
            "fetch ended without settling"
        );

        for subscriber in &subscribers {
            subscriber.deliver(&snapshot);
        }
    }
}

fn remove_subscriber<K, T, E>(cache: &Weak<Shared<K, T, E>>, key: &K, id: SubscriberId)
where
    K: CacheKey,
{
    let Some(shared) = cache.upgrade() else {
        return;
    };
    let mut state = shared.lock();
    if let Some(entry) = state.entries.get_mut(key) {
        entry.subscribers.retain(|s| s.id != id);
        trace!(key = ?key, subscriber = %id, "unsubscribed");
    }
}
