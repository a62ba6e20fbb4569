//! journeycache-core - client-side freshness layer for a TOEIC learning journey.
//!
//! The journey overview and stage list are cached per user and served while
//! fresh. Mutations that can unlock stages are followed by a forced,
//! cache-busted refresh so lock status is never read from before the write.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod journey;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError, FinalTestSubmission, JourneyApi};
pub use cache::{CacheEntry, CacheStore, FileCacheStore, MemoryCacheStore};
pub use config::Config;
pub use journey::{DataSource, JourneyCoordinator, JourneyError, JourneySnapshot, Reconciler};
pub use models::{JourneyOverview, Stage, StageStatus};
