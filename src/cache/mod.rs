//! Cache Module
//!
//! Provides the keyed async cache: per-key entries, request de-duplication,
//! settlement notifications and invalidation.

mod entry;
mod producer;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{Callback, EntrySnapshot, EntryStatus, SubscriberId};
pub use producer::{AsyncProducer, ProducerFuture};
pub use stats::CacheStats;
pub use store::{CacheId, CacheKey, KeyedAsyncCache, SubscriptionHandle, DEFAULT_DEDUPE_INTERVAL};
