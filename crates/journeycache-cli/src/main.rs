//! journeycache - command-line view of a TOEIC learning journey.
//!
//! Reads the journey through the local cache, and re-reads it from the
//! server after every action that can unlock a stage.

mod app;
mod output;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use journeycache_core::journey::{JourneySnapshot, Reconciler};
use journeycache_core::utils::age_display;
use journeycache_core::{FinalTestSubmission, JourneyError};

use app::App;

#[derive(Parser)]
#[command(name = "journeycache", version, about = "TOEIC learning journey client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and remember credentials
    Login {
        /// Account email (prompted when omitted)
        email: Option<String>,
    },
    /// Forget session, credentials and cached journey
    Logout,
    /// Show the journey (cached while fresh)
    Status,
    /// Re-read the journey from the server
    Refresh {
        /// Bypass every cache between here and the database
        #[arg(long)]
        force: bool,
    },
    /// Show cache age and freshness
    Cache,
    /// Mark a day complete, then refresh
    CompleteDay { stage_id: String, day: u32 },
    /// Final test of a stage
    FinalTest {
        #[command(subcommand)]
        action: FinalTestAction,
    },
}

#[derive(Subcommand, Debug)]
enum FinalTestAction {
    /// Start the final test, then refresh
    Start { stage_id: String },
    /// Submit a score, then refresh
    Complete {
        stage_id: String,
        score: f64,
        /// Maximum score; without it the score is a percentage
        max_score: Option<f64>,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr (filtered by `RUST_LOG`, default `warn`) and to a daily
/// rolling file in the cache directory when one is available.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file = journeycache_core::Config::default()
        .cache_root()
        .ok()
        .map(|dir| tracing_appender::rolling::daily(dir.join("logs"), "journeycache.log"))
        .map(tracing_appender::non_blocking);

    match file {
        Some((writer, guard)) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _guard = init_tracing();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    let mut app = App::new()?;
    info!(command = ?command, "journeycache starting");

    match command {
        Commands::Login { email } => app.login(email).await,
        Commands::Logout => {
            app.logout()?;
            println!("Logged out.");
            Ok(())
        }
        Commands::Status => {
            app.restore_session().await?;
            let coordinator = app.coordinator()?;
            show(coordinator.refresh_data().await, coordinator.cached())
        }
        Commands::Refresh { force } => {
            app.restore_session().await?;
            let coordinator = app.coordinator()?;
            let result = if force {
                coordinator.force_refresh().await
            } else {
                coordinator.refresh_data().await
            };
            show(result, coordinator.cached())
        }
        Commands::Cache => {
            let coordinator = app.coordinator()?;
            match coordinator.cached() {
                Some(snapshot) => {
                    let age = snapshot
                        .last_updated_at
                        .map(|at| age_display(at, chrono::Utc::now()))
                        .unwrap_or_else(|| "never".to_string());
                    println!(
                        "Cached journey {} ({} stages), updated {}, {}",
                        snapshot.overview.id.as_deref().unwrap_or("-"),
                        snapshot.stages.len(),
                        age,
                        if coordinator.is_cache_stale() { "stale" } else { "fresh" }
                    );
                    println!("TTL: {} min", coordinator.ttl().num_minutes());
                }
                None => println!("Nothing cached."),
            }
            if let Some(ref session) = app.session.data {
                println!(
                    "Session: {}, expires in {} min",
                    session.username,
                    session.minutes_until_expiry()
                );
            }
            Ok(())
        }
        Commands::CompleteDay { stage_id, day } => {
            require_login(&mut app).await?;
            let coordinator = app.coordinator()?;
            let outcome = Reconciler::new(&coordinator).complete_day(&stage_id, day).await?;
            println!("Day {} of {} completed.", day, stage_id);
            show_refreshed(outcome.refreshed);
            Ok(())
        }
        Commands::FinalTest {
            action: FinalTestAction::Start { stage_id },
        } => {
            require_login(&mut app).await?;
            let coordinator = app.coordinator()?;
            let outcome = Reconciler::new(&coordinator).start_final_test(&stage_id).await?;
            println!(
                "Final test started for {} ({} questions).",
                stage_id,
                outcome.result.question_ids.len()
            );
            show_refreshed(outcome.refreshed);
            Ok(())
        }
        Commands::FinalTest {
            action:
                FinalTestAction::Complete {
                    stage_id,
                    score,
                    max_score,
                },
        } => {
            require_login(&mut app).await?;
            let coordinator = app.coordinator()?;
            let submission = FinalTestSubmission { score, max_score };
            let outcome = Reconciler::new(&coordinator)
                .complete_final_test(&stage_id, &submission)
                .await?;
            output::print_verdict(&outcome.result);
            show_refreshed(outcome.refreshed);
            Ok(())
        }
    }
}

async fn require_login(app: &mut App) -> Result<()> {
    app.restore_session().await?;
    if app.is_authenticated() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Not logged in. Run `journeycache login` first."))
    }
}

/// Print a refresh result, falling back to stale cached data on network failure.
fn show(
    result: Result<JourneySnapshot, JourneyError>,
    fallback: Option<JourneySnapshot>,
) -> Result<()> {
    match result {
        Ok(snapshot) => {
            output::print_snapshot(&snapshot);
            Ok(())
        }
        Err(e) if e.is_auth_error() => Err(anyhow::anyhow!(
            "Session no longer valid. Run `journeycache login` again."
        )),
        Err(e) => match fallback {
            Some(snapshot) => {
                warn!(error = %e, "Refresh failed, showing cached journey");
                eprintln!("Could not reach the server ({}). Showing cached data.", e);
                output::print_snapshot(&snapshot);
                Ok(())
            }
            None => Err(e.into()),
        },
    }
}

fn show_refreshed(refreshed: Option<JourneySnapshot>) {
    match refreshed {
        Some(snapshot) => {
            println!();
            output::print_snapshot(&snapshot);
        }
        None => {
            println!("Journey could not be refreshed; run `journeycache refresh --force` later.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(std::iter::once("journeycache").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_refresh_force_flag() {
        assert!(matches!(parse(&["refresh"]), Commands::Refresh { force: false }));
        assert!(matches!(parse(&["refresh", "--force"]), Commands::Refresh { force: true }));
    }

    #[test]
    fn test_complete_day_args() {
        match parse(&["complete-day", "tpl-1", "3"]) {
            Commands::CompleteDay { stage_id, day } => {
                assert_eq!(stage_id, "tpl-1");
                assert_eq!(day, 3);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(Cli::try_parse_from(["journeycache", "complete-day", "tpl-1", "three"]).is_err());
    }

    #[test]
    fn test_final_test_complete_optional_max() {
        match parse(&["final-test", "complete", "tpl-1", "42", "50"]) {
            Commands::FinalTest {
                action:
                    FinalTestAction::Complete {
                        score, max_score, ..
                    },
            } => {
                assert_eq!(score, 42.0);
                assert_eq!(max_score, Some(50.0));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(matches!(
            parse(&["final-test", "complete", "tpl-1", "70"]),
            Commands::FinalTest {
                action: FinalTestAction::Complete { max_score: None, .. }
            }
        ));
    }

    #[test]
    fn test_login_email_optional() {
        assert!(matches!(parse(&["login"]), Commands::Login { email: None }));
        assert!(matches!(
            parse(&["login", "learner@example.com"]),
            Commands::Login { email: Some(_) }
        ));
    }
}
