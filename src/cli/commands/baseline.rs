use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config;
use crate::database::entity::DATE_YEARS;
use crate::database::DatabaseManager;
use crate::observer::today;
use crate::services::compliance_service::{ComplianceService, AREAS};
use crate::types::window_start;

#[derive(Subcommand)]
pub enum BaselineCommands {
    #[command(about = "Compute and store a compliance baseline for a period")]
    Capture {
        #[arg(long, help = "Practice ID")]
        practice: Uuid,

        #[arg(long, help = "Baseline name")]
        name: String,

        #[arg(long, help = "Period start (defaults to the window before --end)")]
        start: Option<NaiveDate>,

        #[arg(long, help = "Period end (defaults to today)")]
        end: Option<NaiveDate>,
    },
}

pub async fn handle(cmd: BaselineCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        BaselineCommands::Capture { practice, name, start, end } => {
            let end = end.unwrap_or_else(today);
            let window = config::config().compliance.default_window_days;
            let start = match start {
                Some(start) => start,
                None => window_start(end, window).context("--end is too early for the default window")?,
            };
            anyhow::ensure!(
                DATE_YEARS.contains(&start.year()) && DATE_YEARS.contains(&end.year()),
                "dates must be between {} and {}",
                DATE_YEARS.start(),
                DATE_YEARS.end()
            );
            anyhow::ensure!(start <= end, "--start must not be after --end");

            let baseline = ComplianceService::new(DatabaseManager::pool()?)
                .capture_baseline(practice, None, &name, start, end)
                .await?;

            if let OutputFormat::Text = output_format {
                let scores = baseline.verified_scores()?;
                for area in AREAS.iter().chain(std::iter::once(&"overall")) {
                    println!("{:<18} {}", area, percent(scores.area(area)));
                }
            }
            output_success(
                output_format,
                &format!("Captured baseline '{}' for {} to {}", baseline.name, start, end),
                Some(json!({ "baseline": baseline })),
            )
        }
    }
}
