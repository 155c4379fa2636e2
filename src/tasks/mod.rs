//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Revalidation: invalidates a key at a fixed interval so it refetches

mod revalidate;

pub use revalidate::spawn_revalidate_task;
