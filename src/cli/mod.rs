pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::database::DatabaseManager;

#[derive(Parser)]
#[command(name = "gpc")]
#[command(about = "GP Compliance administration CLI")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "Practice management")]
    Practice {
        #[command(subcommand)]
        cmd: commands::practice::PracticeCommands,
    },

    #[command(about = "User management")]
    User {
        #[command(subcommand)]
        cmd: commands::user::UserCommands,
    },

    #[command(about = "Run scheduled jobs once")]
    Jobs {
        #[command(subcommand)]
        cmd: commands::jobs::JobCommands,
    },

    #[command(about = "Compliance baseline snapshots")]
    Baseline {
        #[command(subcommand)]
        cmd: commands::baseline::BaselineCommands,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    let result = match cli.command {
        Commands::Migrate => {
            DatabaseManager::migrate().await?;
            utils::output_success(output_format, "Migrations applied", None)
        }
        Commands::Practice { cmd } => commands::practice::handle(cmd, output_format).await,
        Commands::User { cmd } => commands::user::handle(cmd, output_format).await,
        Commands::Jobs { cmd } => commands::jobs::handle(cmd, output_format).await,
        Commands::Baseline { cmd } => commands::baseline::handle(cmd, output_format).await,
    };

    DatabaseManager::close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_commands_and_global_json_flag() {
        let cli = Cli::try_parse_from(["gpc", "jobs", "reminders", "--json"]).unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        assert!(matches!(
            cli.command,
            Commands::Jobs { cmd: commands::jobs::JobCommands::Reminders { .. } }
        ));
    }

    #[test]
    fn rejects_unknown_commands() {
        assert!(Cli::try_parse_from(["gpc", "widget", "list"]).is_err());
    }
}
