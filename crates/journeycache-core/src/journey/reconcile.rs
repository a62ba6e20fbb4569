//! Mutations that can change unlock state, each followed by a forced refresh.
//!
//! The backend offers no invalidation push, so after completing a day or a
//! final test the client must re-read the journey before showing lock status.
//! The refresh is best effort: if it fails the mutation still counts and the
//! caller keeps whatever data it already has.

use tracing::{info, warn};

use crate::api::{ApiError, FinalTestSubmission};
use crate::models::{CompleteDayResponse, FinalTestResult, FinalTestStart, DEFAULT_MIN_SCORE};

use super::coordinator::{JourneyCoordinator, JourneySnapshot};

/// A mutation's own result plus the journey as re-read afterwards.
#[derive(Debug, Clone)]
pub struct MutationOutcome<T> {
    pub result: T,
    /// `None` when the follow-up refresh failed.
    pub refreshed: Option<JourneySnapshot>,
}

/// Final test result with the pass decision resolved.
#[derive(Debug, Clone)]
pub struct FinalTestVerdict {
    pub result: FinalTestResult,
    pub percent: f64,
    pub min_score: f64,
    pub passed: bool,
}

pub struct Reconciler<'a> {
    coordinator: &'a JourneyCoordinator,
}

impl<'a> Reconciler<'a> {
    pub fn new(coordinator: &'a JourneyCoordinator) -> Self {
        Self { coordinator }
    }

    pub async fn complete_day(
        &self,
        stage_id: &str,
        day_number: u32,
    ) -> Result<MutationOutcome<CompleteDayResponse>, ApiError> {
        let result = self.coordinator.api().complete_day(stage_id, day_number).await?;
        info!(stage_id, day_number, "Day completed");
        let refreshed = self.refresh_after("complete_day").await;
        Ok(MutationOutcome { result, refreshed })
    }

    pub async fn start_final_test(
        &self,
        stage_id: &str,
    ) -> Result<MutationOutcome<FinalTestStart>, ApiError> {
        let result = self.coordinator.api().start_final_test(stage_id).await?;
        info!(stage_id, "Final test started");
        let refreshed = self.refresh_after("start_final_test").await;
        Ok(MutationOutcome { result, refreshed })
    }

    /// Submit a final test and judge it against the stage's pass threshold.
    ///
    /// The threshold comes from the cached stage (its percentage `min_score`),
    /// falling back to the default when the stage is not cached.
    pub async fn complete_final_test(
        &self,
        stage_id: &str,
        submission: &FinalTestSubmission,
    ) -> Result<MutationOutcome<FinalTestVerdict>, ApiError> {
        let min_score = self
            .coordinator
            .cached()
            .and_then(|snapshot| snapshot.stage(stage_id).map(|s| s.min_score))
            .unwrap_or(DEFAULT_MIN_SCORE);

        let result = self
            .coordinator
            .api()
            .complete_final_test(stage_id, submission)
            .await?;

        let verdict = FinalTestVerdict {
            percent: result.percent(),
            passed: result.is_passed(min_score),
            min_score: result.min_score.unwrap_or(min_score),
            result,
        };
        info!(
            stage_id,
            percent = verdict.percent,
            min_score = verdict.min_score,
            passed = verdict.passed,
            "Final test completed"
        );

        let refreshed = self.refresh_after("complete_final_test").await;
        Ok(MutationOutcome {
            result: verdict,
            refreshed,
        })
    }

    async fn refresh_after(&self, action: &str) -> Option<JourneySnapshot> {
        match self.coordinator.force_refresh().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(action, error = %e, "Refresh after mutation failed, keeping existing data");
                None
            }
        }
    }
}
