//! API Handlers
//!
//! HTTP request handlers for each demo page. Pages that wait for data render
//! through a [`SuspenseBoundary`]; the others read a [`LoadingBinding`] once
//! and answer with whatever state the key is in.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tokio::time::Instant;
use tracing::info;

use crate::binding::{no_rerender, Binding, LoadingBinding, RenderCx, Suspend, SuspenseBoundary};
use crate::cache::{CacheStats, KeyedAsyncCache};
use crate::config::Config;
use crate::error::{FetchError, Result, SwrError};
use crate::fetcher::MockFetcher;
use crate::models::{
    HealthResponse, IndexResponse, LoadingView, MultipleSuspenseResponse, MutateResponse,
    PlatformStats, Post, Section, SimultaneousView, StatsResponse, TimeData, User,
};

// == Keys ==
pub const TIME_KEY: &str = "time";
pub const USER_KEY: &str = "user";
pub const POSTS_KEY: &str = "posts";
pub const STATS_KEY: &str = "stats";
pub const USER_SIM_KEY: &str = "user-sim";
pub const POSTS_SIM_KEY: &str = "posts-sim";
pub const STATS_SIM_KEY: &str = "stats-sim";

/// Application state shared across all handlers.
///
/// One cache per resource type; clones share the caches.
#[derive(Clone)]
pub struct AppState {
    pub time: KeyedAsyncCache<String, TimeData, FetchError>,
    pub users: KeyedAsyncCache<String, User, FetchError>,
    pub posts: KeyedAsyncCache<String, Vec<Post>, FetchError>,
    pub stats: KeyedAsyncCache<String, PlatformStats, FetchError>,
    pub fetcher: MockFetcher,
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates a new AppState with empty caches.
    pub fn new(config: Config) -> Self {
        let dedupe_interval = config.dedupe_interval();
        Self {
            time: KeyedAsyncCache::with_dedupe_interval(dedupe_interval),
            users: KeyedAsyncCache::with_dedupe_interval(dedupe_interval),
            posts: KeyedAsyncCache::with_dedupe_interval(dedupe_interval),
            stats: KeyedAsyncCache::with_dedupe_interval(dedupe_interval),
            fetcher: MockFetcher::new(),
            config: Arc::new(config),
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.clone())
    }

    // == Invalidate ==
    /// Invalidates `key` in the cache that has a producer for it.
    ///
    /// Keys are unique across caches, and caches without a producer for the
    /// key answer `UnknownKey` without side effects.
    pub fn invalidate(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        let results = [
            self.time.invalidate(&key),
            self.users.invalidate(&key),
            self.posts.invalidate(&key),
            self.stats.invalidate(&key),
        ];

        results
            .into_iter()
            .find(|result| !matches!(result, Err(SwrError::UnknownKey(_))))
            .unwrap_or_else(|| Err(SwrError::unknown_key(&key)))
    }

    /// Counters of all caches added together.
    pub fn merged_stats(&self) -> CacheStats {
        let mut stats = self.time.stats();
        stats.merge(&self.users.stats());
        stats.merge(&self.posts.stats());
        stats.merge(&self.stats.stats());
        stats
    }

    /// Aborts every running fetch in every cache.
    pub fn abort_in_flight(&self) -> usize {
        self.time.abort_in_flight()
            + self.users.abort_in_flight()
            + self.posts.abort_in_flight()
            + self.stats.abort_in_flight()
    }

    fn time_loading_view(&self) -> Result<LoadingView<TimeData>> {
        let producer = self.fetcher.time(self.config.time_delay());
        let binding = LoadingBinding::bind(&self.time, TIME_KEY.to_string(), producer, no_rerender())?;
        Ok(LoadingView::from_state("time data", binding.evaluate()))
    }
}

/// Handler for GET /
///
/// Renders the time both ways. The loading view is read first, so on a cold
/// cache it reports loading while the suspense view waits on the same fetch.
pub async fn index_handler(State(state): State<AppState>) -> Result<Json<IndexResponse>> {
    let without_suspense = state.time_loading_view()?;

    let mut boundary = SuspenseBoundary::new(TIME_KEY);
    let time = boundary
        .render(|cx| {
            let producer = state.fetcher.time(state.config.time_delay());
            cx.suspend_on(&state.time, TIME_KEY.to_string(), producer)
        })
        .await?;

    Ok(Json(IndexResponse {
        with_suspense: TimeData::clone(&time),
        without_suspense,
    }))
}

/// Handler for GET /without-suspense
///
/// Never waits; reports the loading state of the time key.
pub async fn without_suspense_handler(
    State(state): State<AppState>,
) -> Result<Json<LoadingView<TimeData>>> {
    Ok(Json(state.time_loading_view()?))
}

/// Handler for GET /multiple-suspense
///
/// Renders four boundaries concurrently. Each answers as soon as its own
/// keys settle, and the page waits for the slowest.
pub async fn multiple_suspense_handler(
    State(state): State<AppState>,
) -> Result<Json<MultipleSuspenseResponse>> {
    let started = Instant::now();
    let config = &state.config;
    let fetcher = &state.fetcher;

    let (user, posts, stats, simultaneous) = tokio::try_join!(
        section(USER_KEY, started, |cx| {
            let producer = fetcher.resource::<User>("user", config.user_delay());
            cx.suspend_on(&state.users, USER_KEY.to_string(), producer)
                .map(|user| User::clone(&user))
        }),
        section(POSTS_KEY, started, |cx| {
            let producer = fetcher.resource::<Vec<Post>>("posts", config.posts_delay());
            cx.suspend_on(&state.posts, POSTS_KEY.to_string(), producer)
                .map(|posts| Vec::clone(&posts))
        }),
        section(STATS_KEY, started, |cx| {
            let producer = fetcher.resource::<PlatformStats>("stats", config.stats_delay());
            cx.suspend_on(&state.stats, STATS_KEY.to_string(), producer)
                .map(|stats| PlatformStats::clone(&stats))
        }),
        section("simultaneous", started, |cx| {
            let delay = config.simultaneous_delay();
            // Bind all three before propagating so they load in parallel
            let user = cx.suspend_on(
                &state.users,
                USER_SIM_KEY.to_string(),
                fetcher.resource::<User>("user", delay),
            );
            let posts = cx.suspend_on(
                &state.posts,
                POSTS_SIM_KEY.to_string(),
                fetcher.resource::<Vec<Post>>("posts", delay),
            );
            let stats = cx.suspend_on(
                &state.stats,
                STATS_SIM_KEY.to_string(),
                fetcher.resource::<PlatformStats>("stats", delay),
            );

            let (user, posts, stats) = (user?, posts?, stats?);
            Ok(SimultaneousView {
                user: User::clone(&user),
                post_count: posts.len(),
                stats: PlatformStats::clone(&stats),
            })
        }),
    )?;

    Ok(Json(MultipleSuspenseResponse {
        user,
        posts,
        stats,
        simultaneous,
    }))
}

/// Renders `view` in a fresh boundary named `name`.
async fn section<O, F>(name: &str, started: Instant, view: F) -> Result<Section<O>>
where
    F: FnMut(&mut RenderCx<'_>) -> std::result::Result<O, Suspend>,
{
    let mut boundary = SuspenseBoundary::new(name);
    let data = boundary.render(view).await?;

    Ok(Section {
        boundary: name.to_string(),
        data,
        loaded_after_ms: started.elapsed().as_millis() as u64,
        renders: boundary.render_count(),
    })
}

/// Handler for POST /mutate/:key
///
/// Invalidates the key, which refetches it in the background.
pub async fn mutate_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MutateResponse>> {
    state.invalidate(&key)?;
    info!(key = %key, "mutate requested");

    Ok(Json(MutateResponse::new(key)))
}

/// Handler for GET /stats
///
/// Returns the counters of all caches combined.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.merged_stats().into())
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EntryStatus;
    use std::time::Duration;
    use tokio::time::sleep;

    fn test_state() -> AppState {
        AppState::new(Config::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_suspense_reports_loading_then_data() {
        let state = test_state();

        let view = without_suspense_handler(State(state.clone())).await.unwrap();
        assert!(view.is_loading);
        assert!(view.data.is_none());
        assert_eq!(view.message, "Loading time data...");

        sleep(Duration::from_millis(3100)).await;
        let view = without_suspense_handler(State(state.clone())).await.unwrap();
        assert!(!view.is_loading);
        assert_eq!(view.data.as_ref().map(|t| t.sequence), Some(1));
        assert_eq!(state.fetcher.time_fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_index_shares_one_fetch() {
        let state = test_state();
        let started = Instant::now();

        let response = index_handler(State(state.clone())).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(3000));
        assert!(response.without_suspense.is_loading);
        assert_eq!(response.with_suspense.sequence, 1);
        assert_eq!(state.fetcher.time_fetches(), 1);

        // Past the dedupe interval a revisit is served from the cache and
        // revalidates in the background
        let again = index_handler(State(state.clone())).await.unwrap();
        assert!(!again.without_suspense.is_loading);
        assert!(again.without_suspense.is_validating);
        assert_eq!(again.with_suspense.sequence, 1);
        assert_eq!(state.merged_stats().fetches, 2);

        sleep(Duration::from_millis(3100)).await;
        let refreshed = index_handler(State(state.clone())).await.unwrap();
        assert_eq!(refreshed.with_suspense.sequence, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_revisit_within_dedupe_interval_skips_fetch() {
        let state = AppState::new(Config {
            dedupe_interval_ms: 60_000,
            ..Config::default()
        });
        index_handler(State(state.clone())).await.unwrap();

        let again = index_handler(State(state.clone())).await.unwrap();
        assert!(!again.without_suspense.is_validating);
        assert_eq!(again.with_suspense.sequence, 1);
        assert_eq!(state.merged_stats().fetches, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutate_unknown_key() {
        let state = test_state();

        let result = mutate_handler(State(state.clone()), Path("nope".to_string())).await;
        assert!(matches!(result, Err(SwrError::UnknownKey(_))));

        // The time key has no producer until a page binds it
        let result = mutate_handler(State(state), Path(TIME_KEY.to_string())).await;
        assert!(matches!(result, Err(SwrError::UnknownKey(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutate_refetches_time() {
        let state = test_state();
        index_handler(State(state.clone())).await.unwrap();

        let response = mutate_handler(State(state.clone()), Path(TIME_KEY.to_string()))
            .await
            .unwrap();
        assert_eq!(response.key, TIME_KEY);

        // Old value stays visible while the refetch runs
        let view = without_suspense_handler(State(state.clone())).await.unwrap();
        assert!(view.is_validating);
        assert!(!view.is_loading);
        assert_eq!(view.data.as_ref().map(|t| t.sequence), Some(1));

        sleep(Duration::from_millis(3100)).await;
        let snapshot = state.time.get(&TIME_KEY.to_string());
        assert_eq!(snapshot.status, EntryStatus::Resolved);
        assert_eq!(snapshot.value.map(|t| t.sequence), Some(2));
        assert_eq!(state.merged_stats().invalidations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_multiple_suspense_sections_load_independently() {
        let state = test_state();
        let started = Instant::now();

        let page = multiple_suspense_handler(State(state.clone())).await.unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(3500));

        assert_eq!(page.user.data.name, "John Doe");
        assert!((1000..1500).contains(&page.user.loaded_after_ms));
        assert_eq!(page.posts.data.len(), 3);
        assert!((2000..2500).contains(&page.posts.loaded_after_ms));
        assert_eq!(page.stats.data.total_users, 1234);
        assert!((3000..3500).contains(&page.stats.loaded_after_ms));

        // Three keys in parallel, bounded by one delay
        assert_eq!(page.simultaneous.data.post_count, 3);
        assert!((1500..2000).contains(&page.simultaneous.loaded_after_ms));
        assert!(page.simultaneous.renders >= 2);

        let stats = state.merged_stats();
        assert_eq!(stats.fetches, 6);
        assert_eq!(stats.resolved, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_invalidate_finds_the_right_cache() {
        let state = test_state();
        multiple_suspense_handler(State(state.clone())).await.unwrap();

        state.invalidate(POSTS_SIM_KEY).unwrap();
        assert_eq!(state.posts.stats().invalidations, 1);
        assert_eq!(state.users.stats().invalidations, 0);
        assert_eq!(state.abort_in_flight(), 1);

        // The aborted refetch leaves the old value in place and the key can
        // be refreshed again
        let key = POSTS_SIM_KEY.to_string();
        let snapshot = state.posts.get(&key);
        assert_eq!(snapshot.status, EntryStatus::Resolved);
        assert!(snapshot.value.is_some());

        state.invalidate(POSTS_SIM_KEY).unwrap();
        sleep(Duration::from_millis(1600)).await;
        let snapshot = state.posts.get(&key);
        assert_eq!(snapshot.status, EntryStatus::Resolved);
        assert!(!snapshot.interrupted);
        assert_eq!(state.posts.stats().interrupted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_handler() {
        let state = test_state();

        let response = stats_handler(State(state)).await;
        assert_eq!(response.fetches, 0);
        assert_eq!(response.dedup_rate, 0.0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
