//! API Module
//!
//! HTTP handlers and routing for the demo server.
//!
//! # Endpoints
//! - `GET /` - Time rendered with and without suspense
//! - `GET /without-suspense` - Loading state of the time key
//! - `GET /multiple-suspense` - Four boundaries loading independently
//! - `POST /mutate/:key` - Invalidate a key and refetch it
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
