//! Error types for the keyed async cache
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Swr Error Enum ==
/// Unified error type for the cache, its bindings and the demo server.
#[derive(Error, Debug, Clone)]
pub enum SwrError {
    /// No producer has been registered for the key
    #[error("No producer registered for key: {0}")]
    UnknownKey(String),

    /// The producer for a key rejected
    #[error("Producer failed for key {key}: {cause}")]
    Producer {
        /// Debug rendering of the key
        key: String,
        /// The producer's own error
        cause: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// The fetch for a key was aborted or panicked before producing a value
    #[error("Fetch interrupted before settling for key: {0}")]
    Interrupted(String),

    /// A boundary's view suspended without reading any key
    #[error("Boundary {0} suspended without binding a key")]
    NothingBound(String),

    /// A fetch was started outside of a tokio runtime
    #[error("No async runtime available: {0}")]
    NoRuntime(String),
}

impl SwrError {
    /// Wraps a producer failure stored on a cache entry.
    pub fn producer<K, E>(key: &K, cause: Arc<E>) -> Self
    where
        K: std::fmt::Debug,
        E: std::error::Error + Send + Sync + 'static,
    {
        SwrError::Producer {
            key: format!("{:?}", key),
            cause,
        }
    }

    /// Creates an UnknownKey error from any debuggable key.
    pub fn unknown_key<K: std::fmt::Debug>(key: &K) -> Self {
        SwrError::UnknownKey(format!("{:?}", key))
    }
}

// == Fetch Error Enum ==
/// Failures of the mock data fetcher.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The requested resource does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The resource exists but does not match the requested shape
    #[error("Malformed resource {name}: {reason}")]
    Decode { name: String, reason: String },
}

// == IntoResponse Implementation ==
impl IntoResponse for SwrError {
    fn into_response(self) -> Response {
        let status = match &self {
            SwrError::UnknownKey(_) => StatusCode::NOT_FOUND,
            SwrError::Producer { .. } => StatusCode::BAD_GATEWAY,
            SwrError::Interrupted(_) => StatusCode::SERVICE_UNAVAILABLE,
            SwrError::NothingBound(_) | SwrError::NoRuntime(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, SwrError>;
