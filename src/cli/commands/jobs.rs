use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config;
use crate::database::DatabaseManager;
use crate::jobs::{dispatch, mailer, reminders};
use crate::observer::today;

#[derive(Subcommand)]
pub enum JobCommands {
    #[command(about = "Create due reminders for every active practice")]
    Reminders {
        #[arg(long, help = "Run as if today were this date (YYYY-MM-DD)")]
        date: Option<chrono::NaiveDate>,
    },

    #[command(about = "Email pending high-priority and reminder notifications")]
    Emails {
        #[arg(long, default_value_t = 200)]
        batch_size: i64,
    },
}

pub async fn handle(cmd: JobCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();
    let pool = DatabaseManager::pool()?;

    match cmd {
        JobCommands::Reminders { date } => {
            let summary = reminders::run(&pool, &config.scheduler, date.unwrap_or_else(today)).await?;
            output_success(
                output_format,
                &format!(
                    "{} reminders created across {} practices ({} already sent, {} failed)",
                    summary.notifications, summary.practices, summary.already_sent, summary.failures
                ),
                Some(json!({ "summary": summary })),
            )
        }
        JobCommands::Emails { batch_size } => {
            let mailer = mailer::from_config(&config.email)?;
            let summary = dispatch::run(&pool, mailer, &config.email.app_base_url, batch_size).await?;
            output_success(
                output_format,
                &format!("{} of {} emails sent ({} failed)", summary.sent, summary.pending, summary.failed),
                Some(json!({ "summary": summary })),
            )
        }
    }
}
