//! Plain-text rendering of journey snapshots.

use chrono::Utc;

use journeycache_core::journey::{FinalTestVerdict, JourneySnapshot};
use journeycache_core::models::Stage;
use journeycache_core::utils::{age_display, format_percent, progress_bar, truncate_string};
use journeycache_core::DataSource;

/// Width of the stage title column
const TITLE_WIDTH: usize = 28;

pub fn print_snapshot(snapshot: &JourneySnapshot) {
    let overview = &snapshot.overview;

    if snapshot.source == DataSource::Unauthenticated {
        println!("Not logged in. Run `journeycache login` first.");
        return;
    }
    if !overview.has_journey() {
        println!("No active journey. Pick a level in the app to start one.");
        return;
    }

    println!("{}", overview.title);
    if let Some(ref description) = overview.description {
        println!("{}", description);
    }
    println!(
        "Progress {} {}   Days {}/{}   Stage {}/{}",
        progress_bar(overview.progress, 20),
        format_percent(overview.progress),
        overview.completed_days,
        overview.total_days,
        (overview.current_stage_index + 1).min(overview.total_stages.max(1)),
        overview.total_stages,
    );
    if let Some(current) = snapshot.current_stage() {
        println!("Current: stage {} ({})", current.stage_number, current.status.label());
    }
    println!();

    for stage in &snapshot.stages {
        print_stage(stage);
    }

    println!();
    println!("{}", freshness_line(snapshot));
}

fn print_stage(stage: &Stage) {
    let title = stage
        .title
        .clone()
        .unwrap_or_else(|| format!("Stage {}", stage.stage_number));
    let test = match (stage.final_test.passed, stage.final_test.score) {
        (true, Some(score)) => format!("passed ({})", format_percent(score)),
        (true, None) => "passed".to_string(),
        (false, Some(score)) => format!("not passed ({})", format_percent(score)),
        (false, None) if stage.final_test.unlocked => "ready".to_string(),
        (false, None) => "-".to_string(),
    };
    println!(
        "  {:>2}. {:<width$} {:<11} days {}/{}  pass {}  target {}  test {}",
        stage.stage_number,
        truncate_string(&title, TITLE_WIDTH),
        stage.status.label(),
        stage.completed_days(),
        stage.days.len(),
        format_percent(stage.min_score),
        stage.target_score,
        test,
        width = TITLE_WIDTH,
    );
}

fn freshness_line(snapshot: &JourneySnapshot) -> String {
    let source = match snapshot.source {
        DataSource::Cache => "cache",
        DataSource::Network => "server",
        DataSource::Unauthenticated => "none",
    };
    match snapshot.last_updated_at {
        Some(at) => format!("Source: {} (updated {})", source, age_display(at, Utc::now())),
        None => format!("Source: {}", source),
    }
}

pub fn print_verdict(verdict: &FinalTestVerdict) {
    println!(
        "Score {} (pass mark {}) - {}",
        format_percent(verdict.percent),
        format_percent(verdict.min_score),
        if verdict.passed { "PASSED" } else { "NOT PASSED" }
    );
}
