//! Catalog Service
//!
//! Product catalog with a cache-aside read path, an ingestion write path that
//! schedules image processing through a broker, and the image worker that
//! consumes those jobs.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod queue;
pub mod services;

// Public re-exports
pub use config::Config;
pub use error::{AppError, Result};
