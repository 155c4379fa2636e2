//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check de-duplication, round-trip and unsubscription
//! guarantees over arbitrary operation sequences. Each case runs on a
//! current-thread runtime with paused time, so producer delays cost nothing.

use futures::FutureExt;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::time::sleep;

use crate::cache::{AsyncProducer, EntryStatus, KeyedAsyncCache, ProducerFuture};

// == Test Configuration ==
const KEY_COUNT: usize = 3;
const PRODUCER_DELAY_MS: u64 = 100;

#[derive(Debug, Error)]
#[error("test failure")]
struct TestError;

type TestCache = KeyedAsyncCache<String, u64, TestError>;

fn paused_runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

/// Counts invocations and the highest number of concurrently running calls.
#[derive(Clone, Default)]
struct Tracking {
    calls: Arc<AtomicU32>,
    running: Arc<AtomicI32>,
    max_running: Arc<AtomicI32>,
}

impl AsyncProducer<String, u64, TestError> for Tracking {
    fn produce(&self, _key: String) -> ProducerFuture<u64, TestError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let running = Arc::clone(&self.running);
        let max_running = Arc::clone(&self.max_running);
        async move {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            max_running.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(PRODUCER_DELAY_MS)).await;
            running.fetch_sub(1, Ordering::SeqCst);
            Ok(u64::from(call))
        }
        .boxed()
    }
}

// == Strategies ==
#[derive(Debug, Clone)]
enum CacheOp {
    Fetch { key: usize },
    Invalidate { key: usize },
    Advance { ms: u64 },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (0..KEY_COUNT).prop_map(|key| CacheOp::Fetch { key }),
        (0..KEY_COUNT).prop_map(|key| CacheOp::Invalidate { key }),
        (0u64..250).prop_map(|ms| CacheOp::Advance { ms }),
    ]
}

fn key_name(index: usize) -> String {
    format!("key-{}", index)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // For any interleaving of fetches, invalidations and time passing, no key
    // ever has more than one producer call running, and every started fetch
    // is accounted for exactly once.
    #[test]
    fn prop_single_in_flight_fetch_per_key(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let producers: Vec<Tracking> = (0..KEY_COUNT).map(|_| Tracking::default()).collect();
        let cache = TestCache::new();

        let generations = paused_runtime().block_on(async {
            for op in ops {
                match op {
                    CacheOp::Fetch { key } => {
                        cache.fetch(key_name(key), producers[key].clone()).unwrap();
                    }
                    CacheOp::Invalidate { key } => {
                        // Unknown until the first fetch registered a producer
                        let _ = cache.invalidate(&key_name(key));
                    }
                    CacheOp::Advance { ms } => sleep(Duration::from_millis(ms)).await,
                }
            }
            sleep(Duration::from_millis(PRODUCER_DELAY_MS * 2)).await;

            (0..KEY_COUNT)
                .map(|key| cache.snapshot(&key_name(key)).map(|s| s.generation).unwrap_or(0))
                .collect::<Vec<_>>()
        });

        let mut total_calls = 0u64;
        for (key, producer) in producers.iter().enumerate() {
            let calls = producer.calls.load(Ordering::SeqCst);
            prop_assert!(producer.max_running.load(Ordering::SeqCst) <= 1, "Key {} had overlapping fetches", key);
            prop_assert_eq!(u64::from(calls), generations[key], "Generation mismatch for key {}", key);
            total_calls += u64::from(calls);
        }
        prop_assert_eq!(cache.stats().fetches, total_calls, "Fetch counter mismatch");
    }

    // A burst of concurrent fetch requests issues exactly one producer call.
    #[test]
    fn prop_fetch_burst_deduplicates(burst in 1usize..32) {
        let producer = Tracking::default();
        let cache = TestCache::new();

        let started = paused_runtime().block_on(async {
            let started = (0..burst)
                .filter(|_| cache.fetch("A".to_string(), producer.clone()).unwrap())
                .count();
            sleep(Duration::from_millis(PRODUCER_DELAY_MS * 2)).await;
            started
        });

        prop_assert_eq!(started, 1);
        prop_assert_eq!(producer.calls.load(Ordering::SeqCst), 1);
        prop_assert_eq!(cache.stats().deduplicated, (burst - 1) as u64);
    }

    // However many invalidations arrive back to back, one refetch runs.
    #[test]
    fn prop_invalidate_burst_refetches_once(burst in 1usize..16) {
        let producer = Tracking::default();
        let cache = TestCache::new();

        paused_runtime().block_on(async {
            cache.fetch("A".to_string(), producer.clone()).unwrap();
            sleep(Duration::from_millis(PRODUCER_DELAY_MS * 2)).await;
            for _ in 0..burst {
                cache.invalidate(&"A".to_string()).unwrap();
            }
            sleep(Duration::from_millis(PRODUCER_DELAY_MS * 2)).await;
        });

        prop_assert_eq!(producer.calls.load(Ordering::SeqCst), 2);
        prop_assert_eq!(cache.stats().invalidations, burst as u64);
    }

    // Whatever the producer settles with is what `get` returns afterwards.
    #[test]
    fn prop_roundtrip_settled_value(key in "[a-z0-9_]{1,32}", value in any::<u64>(), delay in 0u64..500) {
        let cache = TestCache::new();

        let snapshot = paused_runtime().block_on(async {
            cache
                .fetch(key.clone(), move |_key: String| async move {
                    sleep(Duration::from_millis(delay)).await;
                    Ok::<_, TestError>(value)
                })
                .unwrap();
            sleep(Duration::from_millis(delay + 1)).await;
            cache.get(&key)
        });

        prop_assert_eq!(snapshot.status, EntryStatus::Resolved);
        prop_assert_eq!(snapshot.value.as_deref(), Some(&value));
    }

    // Callbacks removed before settlement never fire; the rest fire once.
    #[test]
    fn prop_unsubscribed_callbacks_never_fire(
        subscribers in 1usize..12,
        removed in prop::collection::hash_set(0usize..12, 0..12)
    ) {
        let cache = TestCache::new();
        let fired = Arc::new(Mutex::new(Vec::new()));

        paused_runtime().block_on(async {
            let mut handles: Vec<_> = (0..subscribers)
                .map(|i| {
                    let fired = Arc::clone(&fired);
                    Some(cache.subscribe("A".to_string(), move |_| fired.lock().unwrap().push(i)))
                })
                .collect();

            cache.fetch("A".to_string(), Tracking::default()).unwrap();
            sleep(Duration::from_millis(PRODUCER_DELAY_MS / 2)).await;

            for index in removed.iter().filter(|&&i| i < subscribers) {
                if let Some(handle) = handles[*index].take() {
                    handle.unsubscribe();
                }
            }
            sleep(Duration::from_millis(PRODUCER_DELAY_MS)).await;
            drop(handles);
        });

        let expected: Vec<usize> = (0..subscribers).filter(|i| !removed.contains(i)).collect();
        let fired = fired.lock().unwrap().clone();
        prop_assert_eq!(&fired, &expected);

        let unique: HashSet<usize> = fired.iter().copied().collect();
        prop_assert_eq!(unique.len(), fired.len(), "A callback fired twice");
    }
}
