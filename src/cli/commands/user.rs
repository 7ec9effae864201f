use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::database::DatabaseManager;
use crate::services::practice_service::{NewUser, PracticeService};
use crate::types::Role;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create a user in a practice")]
    Create {
        #[arg(long, help = "Practice ID")]
        practice: Uuid,

        #[arg(long)]
        email: String,

        #[arg(long)]
        name: String,

        #[arg(long, default_value = "staff", help = "staff, manager, admin or master")]
        role: Role,

        #[arg(long, env = "GPC_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        UserCommands::Create { practice, email, name, role, password } => {
            // The CLI operates with master rights, so any role may be granted
            let user = PracticeService::new(DatabaseManager::pool()?)
                .create_user(practice, Role::Master, NewUser { email, name, role, password })
                .await?;
            output_success(
                output_format,
                &format!("Created {} user {}", user.role, user.email),
                Some(json!({ "user": user })),
            )
        }
    }
}
