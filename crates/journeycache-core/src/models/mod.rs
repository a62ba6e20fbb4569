//! Data models for the learning journey.
//!
//! This module contains the structures used to represent journey data:
//!
//! - `JourneyOverview`: summary of the user's active journey
//! - `Stage`, `Day`, `FinalTest`: per-stage progress with derived `StageStatus`
//! - Mutation results: `CompleteDayResponse`, `FinalTestStart`, `FinalTestResult`
//!
//! Server payloads are parsed into loose `*Response` structs and normalized
//! into the domain types in one place (`JourneyResponse::to_overview` and
//! `JourneyResponse::to_stages`).

pub mod journey;
pub mod mutation;
pub mod stage;

pub use journey::{JourneyEnvelope, JourneyOverview, JourneyResponse};
pub use mutation::{
    resolve_passed, score_percent, CompleteDayResponse, FinalTestResult, FinalTestStart,
    DEFAULT_MIN_SCORE,
};
pub use stage::{
    Day, DayResponse, FinalTest, FinalTestResponse, Stage, StageResponse, StageStatus,
    DEFAULT_TARGET_SCORE, MAX_TARGET_SCORE, MIN_TARGET_SCORE,
};

use chrono::{DateTime, Utc};

/// Parse an optional RFC 3339 timestamp, ignoring values the server formats differently.
pub(crate) fn parse_timestamp(value: &Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Clamp a percentage into [0, 100], mapping NaN to 0.
pub(crate) fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
