use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage::{Stage, StageResponse, StageStatus};
use super::{clamp_percent, parse_timestamp};
use crate::journey::status::apply_statuses;

/// Summary of the learner's active journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JourneyOverview {
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    /// Overall progress, 0-100
    pub progress: f64,
    pub current_stage_index: usize,
    pub total_stages: usize,
    /// Completed days as a percentage of all days, 0-100
    pub completion_rate: f64,
    pub completed_days: usize,
    pub total_days: usize,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub no_journey_found: bool,
}

impl JourneyOverview {
    /// Overview for a learner with no active journey.
    pub fn no_journey() -> Self {
        Self {
            no_journey_found: true,
            ..Self::default()
        }
    }

    pub fn has_journey(&self) -> bool {
        !self.no_journey_found
    }
}

// ============================================================================
// Wire format
// ============================================================================

/// Journey document as returned by `GET /journeys/current`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JourneyResponse {
    #[serde(alias = "_id")]
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub progress: Option<f64>,
    #[serde(rename = "currentStageIndex", alias = "currentStage")]
    pub current_stage_index: Option<usize>,
    #[serde(rename = "completionRate")]
    pub completion_rate: Option<f64>,
    pub stages: Option<Vec<StageResponse>>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,
    #[serde(rename = "startedAt")]
    pub started_at: Option<String>,
    #[serde(rename = "completedAt")]
    pub completed_at: Option<String>,
}

/// The journey document may arrive bare or wrapped in `{ "data": ... }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JourneyEnvelope {
    Wrapped { data: JourneyResponse },
    Bare(JourneyResponse),
}

impl JourneyEnvelope {
    pub fn into_inner(self) -> JourneyResponse {
        match self {
            JourneyEnvelope::Wrapped { data } => data,
            JourneyEnvelope::Bare(journey) => journey,
        }
    }
}

impl JourneyResponse {
    /// Normalize the stage sub-array, ordered by stage number, with statuses derived.
    pub fn to_stages(&self) -> Vec<Stage> {
        let journey_id = self.id.as_deref();
        let mut stages: Vec<Stage> = self
            .stages
            .iter()
            .flatten()
            .enumerate()
            .map(|(i, s)| s.to_stage(i, journey_id))
            .collect();
        stages.sort_by_key(|s| s.stage_number);
        apply_statuses(&mut stages);
        stages
    }

    pub fn to_overview(&self) -> JourneyOverview {
        let stages = self.to_stages();
        // An empty document means the same thing as a 404
        if self.id.is_none() && stages.is_empty() {
            return JourneyOverview::no_journey();
        }

        let total_days: usize = stages.iter().map(|s| s.days.len()).sum();
        let completed_days: usize = stages.iter().map(Stage::completed_days).sum();
        let derived_rate = if total_days == 0 {
            0.0
        } else {
            completed_days as f64 / total_days as f64 * 100.0
        };
        let completion_rate = clamp_percent(self.completion_rate.unwrap_or(derived_rate));

        // Server index first, else the first stage still open, else the last stage
        let current_stage_index = match self.current_stage_index {
            Some(index) if !stages.is_empty() => index.min(stages.len() - 1),
            Some(_) => 0,
            None => stages
                .iter()
                .position(|s| s.status != StageStatus::Completed)
                .unwrap_or_else(|| stages.len().saturating_sub(1)),
        };

        JourneyOverview {
            id: self.id.clone(),
            title: self.title.clone().unwrap_or_default(),
            description: self.description.clone(),
            progress: clamp_percent(self.progress.unwrap_or(completion_rate)),
            current_stage_index,
            total_stages: stages.len(),
            completion_rate,
            completed_days,
            total_days,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            started_at: parse_timestamp(&self.started_at),
            completed_at: parse_timestamp(&self.completed_at),
            no_journey_found: false,
        }
    }
}
