use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mutation::{resolve_passed, score_percent, DEFAULT_MIN_SCORE};
use super::{clamp_percent, parse_timestamp};

/// Lowest score on the TOEIC scale a stage can target.
pub const MIN_TARGET_SCORE: u32 = 300;

/// Highest score on the TOEIC scale a stage can target.
pub const MAX_TARGET_SCORE: u32 = 990;

/// Target score assumed when the server omits one.
pub const DEFAULT_TARGET_SCORE: u32 = 450;

/// Lock state of a stage as shown to the learner.
///
/// Always derived from progress data (see `journey::status::derive_status`),
/// never taken from the server as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    #[default]
    Locked,
    Unlocked,
    InProgress,
    Completed,
}

impl StageStatus {
    /// Parse a status string in either backend (`in_progress`) or frontend
    /// (`IN_PROGRESS`, `inProgress`) spelling.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized: String = value
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "locked" => Some(StageStatus::Locked),
            "unlocked" | "available" => Some(StageStatus::Unlocked),
            "inprogress" | "started" => Some(StageStatus::InProgress),
            "completed" | "complete" | "passed" => Some(StageStatus::Completed),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StageStatus::Locked => "LOCKED",
            StageStatus::Unlocked => "UNLOCKED",
            StageStatus::InProgress => "IN_PROGRESS",
            StageStatus::Completed => "COMPLETED",
        }
    }
}

/// One study day inside a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Day {
    pub day_number: u32,
    pub started: bool,
    pub completed: bool,
    pub questions: Vec<String>,
}

/// Final test gating promotion to the next stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FinalTest {
    pub unlocked: bool,
    pub started: bool,
    pub completed: bool,
    pub passed: bool,
    pub score: Option<f64>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A stage of the journey with the learner's progress folded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Stage template id
    pub id: String,
    /// Id of the learner's progress record for this stage
    pub progress_id: Option<String>,
    /// Journey this stage was produced from
    pub journey_id: Option<String>,
    pub stage_number: u32,
    pub title: Option<String>,
    /// Percentage (0-100) required to pass the final test
    pub min_score: f64,
    /// TOEIC score (300-990) the stage prepares for. Not a pass threshold.
    pub target_score: u32,
    pub days: Vec<Day>,
    pub final_test: FinalTest,
    pub started: bool,
    pub status: StageStatus,
}

impl Stage {
    pub fn completed_days(&self) -> usize {
        self.days.iter().filter(|d| d.completed).count()
    }

    /// Fraction of days completed, 0.0 when the stage has no days.
    pub fn completion_ratio(&self) -> f64 {
        if self.days.is_empty() {
            0.0
        } else {
            self.completed_days() as f64 / self.days.len() as f64
        }
    }
}

// ============================================================================
// Wire format
// ============================================================================

/// Question reference as sent by the server: a bare id or a populated document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionRef {
    Id(String),
    Document {
        #[serde(alias = "_id")]
        id: Option<String>,
    },
}

impl QuestionRef {
    fn id(&self) -> Option<String> {
        match self {
            QuestionRef::Id(id) => Some(id.clone()),
            QuestionRef::Document { id } => id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DayResponse {
    #[serde(rename = "dayNumber")]
    pub day_number: Option<u32>,
    pub started: Option<bool>,
    #[serde(alias = "isCompleted")]
    pub completed: Option<bool>,
    pub questions: Option<Vec<QuestionRef>>,
}

impl DayResponse {
    pub fn to_day(&self, fallback_number: u32) -> Day {
        let completed = self.completed.unwrap_or(false);
        Day {
            day_number: self.day_number.unwrap_or(fallback_number),
            // A completed day was necessarily started
            started: self.started.unwrap_or(false) || completed,
            completed,
            questions: self
                .questions
                .iter()
                .flatten()
                .filter_map(QuestionRef::id)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FinalTestResponse {
    pub unlocked: Option<bool>,
    pub started: Option<bool>,
    pub completed: Option<bool>,
    pub passed: Option<bool>,
    pub score: Option<f64>,
    #[serde(rename = "maxScore")]
    pub max_score: Option<f64>,
    #[serde(rename = "completedAt")]
    pub completed_at: Option<String>,
}

impl FinalTestResponse {
    pub fn to_final_test(&self, min_score: f64, all_days_completed: bool) -> FinalTest {
        let completed = self.completed.unwrap_or(false);
        // Without an explicit verdict, a completed test is judged against the stage threshold
        let passed = match (self.passed, completed, self.score) {
            (Some(passed), _, _) => passed,
            (None, true, Some(score)) => resolve_passed(
                None,
                score_percent(score, self.max_score),
                min_score,
            ),
            _ => false,
        };
        FinalTest {
            unlocked: self.unlocked.unwrap_or(all_days_completed) || passed,
            started: self.started.unwrap_or(false) || completed,
            completed: completed || passed,
            passed,
            score: self.score,
            completed_at: parse_timestamp(&self.completed_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StageResponse {
    #[serde(alias = "_id", alias = "stageId")]
    pub id: Option<String>,
    #[serde(rename = "userProgressId", alias = "progressId")]
    pub user_progress_id: Option<String>,
    #[serde(rename = "stageNumber")]
    pub stage_number: Option<u32>,
    pub title: Option<String>,
    #[serde(rename = "minScore")]
    pub min_score: Option<f64>,
    #[serde(rename = "targetScore")]
    pub target_score: Option<f64>,
    pub days: Option<Vec<DayResponse>>,
    #[serde(rename = "finalTest")]
    pub final_test: Option<FinalTestResponse>,
    pub started: Option<bool>,
    pub status: Option<String>,
}

impl StageResponse {
    /// Normalize into a `Stage`. The returned status is a placeholder until
    /// `journey::status::apply_statuses` runs over the whole list.
    pub fn to_stage(&self, index: usize, journey_id: Option<&str>) -> Stage {
        let stage_number = self.stage_number.unwrap_or(index as u32 + 1);
        let min_score = clamp_percent(self.min_score.unwrap_or(DEFAULT_MIN_SCORE));
        let target_score = self
            .target_score
            .filter(|s| s.is_finite())
            .map(|s| (s.round() as u32).clamp(MIN_TARGET_SCORE, MAX_TARGET_SCORE))
            .unwrap_or(DEFAULT_TARGET_SCORE);

        let days: Vec<Day> = self
            .days
            .iter()
            .flatten()
            .enumerate()
            .map(|(i, d)| d.to_day(i as u32 + 1))
            .collect();
        let all_days_completed = !days.is_empty() && days.iter().all(|d| d.completed);

        let final_test = self
            .final_test
            .as_ref()
            .map(|ft| ft.to_final_test(min_score, all_days_completed))
            .unwrap_or_else(|| FinalTest {
                unlocked: all_days_completed,
                ..FinalTest::default()
            });

        let server_status = self.status.as_deref().and_then(StageStatus::parse);
        let started = self.started.unwrap_or(false)
            || matches!(server_status, Some(StageStatus::InProgress))
            || days.iter().any(|d| d.started);

        Stage {
            id: self
                .id
                .clone()
                .unwrap_or_else(|| format!("stage-{}", stage_number)),
            progress_id: self.user_progress_id.clone(),
            journey_id: journey_id.map(str::to_string),
            stage_number,
            title: self.title.clone(),
            min_score,
            target_score,
            days,
            final_test,
            started,
            status: StageStatus::Locked,
        }
    }
}
