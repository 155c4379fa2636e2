//! Cache Statistics Module
//!
//! Tracks fetch activity: producer invocations, de-duplicated requests,
//! settlements and invalidations.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache activity counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of producer invocations started
    pub fetches: u64,
    /// Number of fetch requests absorbed by an in-flight fetch
    pub deduplicated: u64,
    /// Number of fetches that resolved
    pub resolved: u64,
    /// Number of fetches that rejected
    pub rejected: u64,
    /// Number of fetches aborted or panicked before settling
    pub interrupted: u64,
    /// Number of invalidation requests
    pub invalidations: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Dedup Rate ==
    /// Share of fetch requests that were served by an already running fetch.
    ///
    /// Returns deduplicated / (fetches + deduplicated), or 0.0 with no requests.
    pub fn dedup_rate(&self) -> f64 {
        let total = self.fetches + self.deduplicated;
        if total == 0 {
            0.0
        } else {
            self.deduplicated as f64 / total as f64
        }
    }

    pub fn record_fetch(&mut self) {
        self.fetches += 1;
    }

    pub fn record_dedup(&mut self) {
        self.deduplicated += 1;
    }

    pub fn record_resolved(&mut self) {
        self.resolved += 1;
    }

    pub fn record_rejected(&mut self) {
        self.rejected += 1;
    }

    pub fn record_interrupted(&mut self) {
        self.interrupted += 1;
    }

    pub fn record_invalidation(&mut self) {
        self.invalidations += 1;
    }

    // == Update Entry Count ==
    /// Updates the total entries count.
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }

    // == Merge ==
    /// Adds another cache's counters into this one.
    pub fn merge(&mut self, other: &CacheStats) {
        self.fetches += other.fetches;
        self.deduplicated += other.deduplicated;
        self.resolved += other.resolved;
        self.rejected += other.rejected;
        self.interrupted += other.interrupted;
        self.invalidations += other.invalidations;
        self.total_entries += other.total_entries;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.fetches, 0);
        assert_eq!(stats.deduplicated, 0);
        assert_eq!(stats.invalidations, 0);
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_dedup_rate_no_requests() {
        assert_eq!(CacheStats::new().dedup_rate(), 0.0);
    }

    #[test]
    fn test_dedup_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_fetch();
        stats.record_dedup();
        stats.record_dedup();
        stats.record_fetch();
        assert_eq!(stats.dedup_rate(), 0.5);
    }

    #[test]
    fn test_settlement_counters() {
        let mut stats = CacheStats::new();
        stats.record_resolved();
        stats.record_resolved();
        stats.record_rejected();
        stats.record_interrupted();
        assert_eq!(stats.resolved, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.interrupted, 1);
    }

    #[test]
    fn test_merge() {
        let mut a = CacheStats::new();
        a.record_fetch();
        a.set_total_entries(2);

        let mut b = CacheStats::new();
        b.record_fetch();
        b.record_invalidation();
        b.set_total_entries(3);

        a.merge(&b);
        assert_eq!(a.fetches, 2);
        assert_eq!(a.invalidations, 1);
        assert_eq!(a.total_entries, 5);
    }
}
