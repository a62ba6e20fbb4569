//! REST API client module for the learning journey backend.
//!
//! This module provides the `JourneyApi` trait consumed by the coordinator
//! and its HTTP implementation `ApiClient`.
//!
//! The backend uses bearer token authentication obtained through
//! `POST /auth/login`.

pub mod client;
pub mod error;

use async_trait::async_trait;

pub use client::{ApiClient, FinalTestSubmission, CACHE_BUST_PARAM, DEFAULT_API_BASE_URL};
pub use error::ApiError;

use crate::models::{CompleteDayResponse, FinalTestResult, FinalTestStart, JourneyOverview, Stage};

/// Read and mutation endpoints of the journey backend.
///
/// Reads take an optional cache-busting timestamp (epoch ms). A missing
/// journey (404) is reported as `JourneyOverview::no_journey()` / no stages,
/// not as an error.
#[async_trait]
pub trait JourneyApi: Send + Sync {
    /// Whether a session token is available for requests.
    fn is_authenticated(&self) -> bool;

    async fn fetch_overview(&self, cache_bust: Option<i64>) -> Result<JourneyOverview, ApiError>;

    async fn fetch_stages(&self, cache_bust: Option<i64>) -> Result<Vec<Stage>, ApiError>;

    async fn complete_day(
        &self,
        stage_id: &str,
        day_number: u32,
    ) -> Result<CompleteDayResponse, ApiError>;

    async fn start_final_test(&self, stage_id: &str) -> Result<FinalTestStart, ApiError>;

    async fn complete_final_test(
        &self,
        stage_id: &str,
        submission: &FinalTestSubmission,
    ) -> Result<FinalTestResult, ApiError>;
}
