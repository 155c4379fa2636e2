//! Data and response models for the demo server
//!
//! `data` holds the resources the mock fetcher serves; `responses` the
//! JSON bodies of each page.

pub mod data;
pub mod responses;

// Re-export commonly used types
pub use data::{PlatformStats, Post, TimeData, User};
pub use responses::{
    ErrorResponse, HealthResponse, IndexResponse, LoadingView, MultipleSuspenseResponse,
    MutateResponse, Section, SimultaneousView, StatsResponse,
};
