//! Mock Fetcher
//!
//! Producers that answer after a fixed delay, standing in for a slow API.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::cache::AsyncProducer;
use crate::error::FetchError;
use crate::models::TimeData;

// == Mock Fetcher ==
/// Source of the demo's producers.
///
/// Clones share the time sequence counter.
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    sequence: Arc<AtomicU64>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of time fetches completed so far.
    pub fn time_fetches(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    // == Time ==
    /// Producer for the current time, answering after `delay`.
    pub fn time(&self, delay: Duration) -> impl AsyncProducer<String, TimeData, FetchError> {
        let sequence = Arc::clone(&self.sequence);
        move |key: String| {
            let sequence = Arc::clone(&sequence);
            async move {
                tokio::time::sleep(delay).await;
                let time = TimeData::now(sequence.fetch_add(1, Ordering::SeqCst) + 1);
                debug!(key = %key, sequence = time.sequence, "time fetched");
                Ok::<_, FetchError>(time)
            }
        }
    }

    // == Resource ==
    /// Producer for the catalog entry `name`, answering after `delay`.
    ///
    /// The cache key is independent of `name`, so several keys can load the
    /// same resource.
    pub fn resource<T>(
        &self,
        name: &'static str,
        delay: Duration,
    ) -> impl AsyncProducer<String, T, FetchError>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        move |key: String| async move {
            tokio::time::sleep(delay).await;
            debug!(key = %key, resource = name, "resource fetched");
            lookup::<T>(name)
        }
    }
}

/// Decodes catalog entry `name` into `T`.
pub fn lookup<T: DeserializeOwned>(name: &str) -> Result<T, FetchError> {
    let mut catalog = catalog();
    let value = catalog
        .get_mut(name)
        .map(Value::take)
        .ok_or_else(|| FetchError::NotFound(name.to_string()))?;

    serde_json::from_value(value).map_err(|e| FetchError::Decode {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn catalog() -> Value {
    json!({
        "user": { "id": 1, "name": "John Doe", "email": "john@example.com" },
        "posts": [
            { "id": 1, "title": "First Post", "content": "This is my first post" },
            { "id": 2, "title": "Second Post", "content": "Another interesting post" },
            { "id": 3, "title": "Third Post", "content": "Yet another post" }
        ],
        "stats": {
            "totalUsers": 1234,
            "totalPosts": 5678,
            "activeToday": 234,
            "lastUpdated": chrono::Utc::now().to_rfc3339()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlatformStats, Post, User};

    #[test]
    fn test_lookup_user() {
        let user: User = lookup("user").unwrap();
        assert_eq!(user.name, "John Doe");
        assert_eq!(user.email, "john@example.com");
    }

    #[test]
    fn test_lookup_posts_and_stats() {
        let posts: Vec<Post> = lookup("posts").unwrap();
        assert_eq!(posts.len(), 3);

        let stats: PlatformStats = lookup("stats").unwrap();
        assert_eq!(stats.total_users, 1234);
    }

    #[test]
    fn test_lookup_unknown_resource() {
        let result: Result<User, _> = lookup("comments");
        assert_eq!(result, Err(FetchError::NotFound("comments".to_string())));
    }

    #[test]
    fn test_lookup_wrong_shape() {
        let result: Result<User, _> = lookup("posts");
        assert!(matches!(result, Err(FetchError::Decode { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_producer_waits_and_counts() {
        let fetcher = MockFetcher::new();
        let producer = fetcher.time(Duration::from_millis(3000));
        let started = tokio::time::Instant::now();

        let first = producer.produce("time".to_string()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(3000));
        let second = producer.produce("time".to_string()).await.unwrap();

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(fetcher.time_fetches(), 2);
    }
}
