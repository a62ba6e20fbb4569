//! Stage status derivation.
//!
//! Status is recomputed whenever stage data is produced. Precedence:
//!
//! 1. final test passed => `Completed`
//! 2. previous stage exists and its final test is not passed => `Locked`
//! 3. stage started, or any day completed => `InProgress`
//! 4. otherwise => `Unlocked`

use crate::models::{Stage, StageStatus};

pub fn derive_status(stage: &Stage, previous: Option<&Stage>) -> StageStatus {
    if stage.final_test.passed {
        return StageStatus::Completed;
    }
    if previous.is_some_and(|p| !p.final_test.passed) {
        return StageStatus::Locked;
    }
    if stage.started || stage.completion_ratio() > 0.0 {
        return StageStatus::InProgress;
    }
    StageStatus::Unlocked
}

/// Recompute the status of every stage in order. `stages` must already be
/// sorted by stage number.
pub fn apply_statuses(stages: &mut [Stage]) {
    for i in 0..stages.len() {
        let status = {
            let (before, rest) = stages.split_at(i);
            derive_status(&rest[0], before.last())
        };
        stages[i].status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Day, FinalTest};

    fn stage(number: u32) -> Stage {
        Stage {
            id: format!("tpl-{}", number),
            progress_id: None,
            journey_id: Some("j1".to_string()),
            stage_number: number,
            title: None,
            min_score: 70.0,
            target_score: 450,
            days: vec![
                Day { day_number: 1, ..Default::default() },
                Day { day_number: 2, ..Default::default() },
            ],
            final_test: FinalTest::default(),
            started: false,
            status: StageStatus::Locked,
        }
    }

    fn passed(mut s: Stage) -> Stage {
        s.final_test = FinalTest {
            unlocked: true,
            started: true,
            completed: true,
            passed: true,
            score: Some(100.0),
            completed_at: None,
        };
        s
    }

    #[test]
    fn test_first_stage_never_locked() {
        assert_eq!(derive_status(&stage(1), None), StageStatus::Unlocked);
    }

    #[test]
    fn test_locked_until_previous_passes() {
        let first = stage(1);
        assert_eq!(derive_status(&stage(2), Some(&first)), StageStatus::Locked);

        let first = passed(first);
        assert_eq!(derive_status(&stage(2), Some(&first)), StageStatus::Unlocked);
    }

    #[test]
    fn test_completed_wins_over_lock() {
        // Passing data from the server is trusted even if the previous stage looks unfinished
        let second = passed(stage(2));
        assert_eq!(derive_status(&second, Some(&stage(1))), StageStatus::Completed);
    }

    #[test]
    fn test_in_progress_from_days_or_started() {
        let mut s = stage(1);
        s.days[0].completed = true;
        assert_eq!(derive_status(&s, None), StageStatus::InProgress);

        let mut s = stage(1);
        s.started = true;
        assert_eq!(derive_status(&s, None), StageStatus::InProgress);
    }

    #[test]
    fn test_all_days_done_but_test_failed_stays_in_progress() {
        let mut s = stage(1);
        for day in &mut s.days {
            day.completed = true;
        }
        s.final_test.completed = true;
        s.final_test.score = Some(69.9);
        assert_eq!(derive_status(&s, None), StageStatus::InProgress);
    }

    #[test]
    fn test_apply_statuses_chain() {
        let mut stages = vec![passed(stage(1)), stage(2), stage(3)];
        apply_statuses(&mut stages);
        let statuses: Vec<_> = stages.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![StageStatus::Completed, StageStatus::Unlocked, StageStatus::Locked]
        );
    }
}
