//! swr_suspense - A keyed async cache with suspense-style bindings
//!
//! Fetches each key at most once at a time, shares the result with every
//! subscriber, and lets consumers either suspend until a key has settled or
//! read its loading state without waiting. Ships with a small demo server.

pub mod api;
pub mod binding;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use binding::{Binding, LoadingBinding, LoadingState, Suspend, SuspenseBinding, SuspenseBoundary};
pub use cache::{AsyncProducer, EntrySnapshot, EntryStatus, KeyedAsyncCache, SubscriptionHandle};
pub use config::Config;
pub use error::{Result, SwrError};
pub use tasks::spawn_revalidate_task;
