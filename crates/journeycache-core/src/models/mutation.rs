//! Responses from the endpoints that change unlock state.
//!
//! None of these responses are authoritative for stage status: after any of
//! them the journey must be force-refreshed (see `journey::reconcile`).

use serde::{Deserialize, Serialize};

use super::clamp_percent;

/// Pass threshold, in percent of the maximum score, when a stage does not specify one.
pub const DEFAULT_MIN_SCORE: f64 = 70.0;

/// Express a raw score as a percentage of `max_score`.
///
/// Without a usable maximum the score is assumed to already be a percentage.
pub fn score_percent(score: f64, max_score: Option<f64>) -> f64 {
    match max_score {
        Some(max) if max > 0.0 && max.is_finite() => clamp_percent(score / max * 100.0),
        _ => clamp_percent(score),
    }
}

/// Decide whether a final test was passed.
///
/// An explicit server verdict always wins; otherwise the percentage score is
/// compared against `min_score` (a percentage, never the TOEIC target score).
pub fn resolve_passed(server_passed: Option<bool>, score_percent: f64, min_score: f64) -> bool {
    server_passed.unwrap_or(score_percent >= min_score)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompleteDayResponse {
    #[serde(rename = "stageId", alias = "stage_id")]
    pub stage_id: Option<String>,
    #[serde(rename = "dayNumber")]
    pub day_number: Option<u32>,
    pub completed: Option<bool>,
    #[serde(rename = "nextDayUnlocked")]
    pub next_day_unlocked: Option<bool>,
    #[serde(rename = "finalTestUnlocked")]
    pub final_test_unlocked: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FinalTestStart {
    #[serde(rename = "stageId")]
    pub stage_id: Option<String>,
    pub started: Option<bool>,
    #[serde(rename = "questionIds", default)]
    pub question_ids: Vec<String>,
}

/// Raw result of submitting a final test.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FinalTestResult {
    #[serde(rename = "stageId")]
    pub stage_id: Option<String>,
    pub score: Option<f64>,
    #[serde(rename = "maxScore")]
    pub max_score: Option<f64>,
    #[serde(rename = "minScore")]
    pub min_score: Option<f64>,
    pub passed: Option<bool>,
    #[serde(rename = "nextStageUnlocked")]
    pub next_stage_unlocked: Option<bool>,
}

impl FinalTestResult {
    /// Score as a percentage of the maximum.
    pub fn percent(&self) -> f64 {
        score_percent(self.score.unwrap_or(0.0), self.max_score)
    }

    /// Whether the learner passed, judged against `stage_min_score` when the
    /// server neither decides nor reports its own threshold.
    pub fn is_passed(&self, stage_min_score: f64) -> bool {
        let min_score = clamp_percent(self.min_score.unwrap_or(stage_min_score));
        resolve_passed(self.passed, self.percent(), min_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pass_boundary() {
        assert!(resolve_passed(None, 70.0, 70.0));
        assert!(!resolve_passed(None, 69.0, 70.0));
        assert!(!resolve_passed(None, 69.9, 70.0));
        assert!(resolve_passed(None, 100.0, 70.0));
    }

    #[test]
    fn test_server_verdict_overrides_threshold() {
        assert!(!resolve_passed(Some(false), 100.0, 70.0));
        assert!(resolve_passed(Some(true), 10.0, 70.0));
    }

    #[test]
    fn test_score_percent_of_maximum() {
        assert_eq!(score_percent(140.0, Some(200.0)), 70.0);
        assert_eq!(score_percent(85.0, None), 85.0);
        assert_eq!(score_percent(85.0, Some(0.0)), 85.0);
        assert_eq!(score_percent(250.0, Some(200.0)), 100.0);
    }

    #[test]
    fn test_final_test_result_uses_stage_threshold() {
        let result: FinalTestResult =
            serde_json::from_value(json!({ "score": 35, "maxScore": 50 })).unwrap();
        assert_eq!(result.percent(), 70.0);
        assert!(result.is_passed(70.0));
        assert!(!result.is_passed(80.0));
    }

    #[test]
    fn test_final_test_result_server_threshold() {
        let result: FinalTestResult =
            serde_json::from_value(json!({ "score": 75, "minScore": 80 })).unwrap();
        assert!(!result.is_passed(70.0));
    }

    #[test]
    fn test_min_score_never_target_score() {
        // A stage targeting TOEIC 450 still passes its test at 70%
        let result: FinalTestResult = serde_json::from_value(json!({ "score": 72 })).unwrap();
        assert!(result.is_passed(DEFAULT_MIN_SCORE));
        assert!(!resolve_passed(None, result.percent(), 450.0));
    }
}
