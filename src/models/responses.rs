//! Response DTOs for the demo server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::fmt::Display;

use serde::Serialize;

use crate::binding::LoadingState;
use crate::cache::CacheStats;
use crate::models::{PlatformStats, Post, TimeData, User};

/// What the loading-state view of a resource renders.
///
/// `data` is only populated once the key has a value; `message` is the text
/// a page would show in its place.
#[derive(Debug, Clone, Serialize)]
pub struct LoadingView<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub is_loading: bool,
    pub is_validating: bool,
    pub message: String,
}

impl<T: Clone> LoadingView<T> {
    /// Renders `state` for the resource called `resource`.
    pub fn from_state<E: Display>(resource: &str, state: LoadingState<T, E>) -> Self {
        let message = match (&state.error, state.is_loading, state.is_validating) {
            (Some(error), _, _) => format!("Failed to load {}: {}", resource, error),
            (None, true, _) => format!("Loading {}...", resource),
            (None, false, true) => format!("Refreshing {}...", resource),
            (None, false, false) => format!("Loaded {}", resource),
        };

        Self {
            data: state.value.as_deref().cloned(),
            error: state.error.as_ref().map(|e| e.to_string()),
            is_loading: state.is_loading,
            is_validating: state.is_validating,
            message,
        }
    }
}

/// Response body for the index page (GET /)
#[derive(Debug, Clone, Serialize)]
pub struct IndexResponse {
    /// Rendered through a suspense boundary; the request waited for it
    pub with_suspense: TimeData,
    /// Rendered from the loading state at request time
    pub without_suspense: LoadingView<TimeData>,
}

/// One suspense boundary of the multiple-suspense page.
#[derive(Debug, Clone, Serialize)]
pub struct Section<O> {
    pub boundary: String,
    pub data: O,
    /// Time from the request until the boundary stopped suspending
    pub loaded_after_ms: u64,
    /// Number of view evaluations, fallback renders included
    pub renders: u64,
}

/// Output of the view that reads three keys at once.
#[derive(Debug, Clone, Serialize)]
pub struct SimultaneousView {
    pub user: User,
    pub post_count: usize,
    pub stats: PlatformStats,
}

/// Response body for the multiple-suspense page (GET /multiple-suspense)
#[derive(Debug, Clone, Serialize)]
pub struct MultipleSuspenseResponse {
    pub user: Section<User>,
    pub posts: Section<Vec<Post>>,
    pub stats: Section<PlatformStats>,
    pub simultaneous: Section<SimultaneousView>,
}

/// Response body for an invalidation (POST /mutate/:key)
#[derive(Debug, Clone, Serialize)]
pub struct MutateResponse {
    /// Success message
    pub message: String,
    /// The key that was invalidated
    pub key: String,
}

impl MutateResponse {
    /// Creates a new MutateResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' invalidated, refetch started", key),
            key,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Producer invocations started
    pub fetches: u64,
    /// Fetch requests that joined an in-flight request
    pub deduplicated: u64,
    pub resolved: u64,
    pub rejected: u64,
    /// Fetches aborted or panicked before settling
    pub interrupted: u64,
    pub invalidations: u64,
    /// Current number of entries across all caches
    pub total_entries: usize,
    /// deduplicated / (fetches + deduplicated)
    pub dedup_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            fetches: stats.fetches,
            deduplicated: stats.deduplicated,
            resolved: stats.resolved,
            rejected: stats.rejected,
            interrupted: stats.interrupted,
            invalidations: stats.invalidations,
            total_entries: stats.total_entries,
            dedup_rate: stats.dedup_rate(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
