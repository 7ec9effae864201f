use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::database::DatabaseManager;
use crate::services::practice_service::{NewPractice, NewUser, PracticeService};
use crate::types::Role;

#[derive(Subcommand)]
pub enum PracticeCommands {
    #[command(about = "List all practices")]
    List,

    #[command(about = "Create a practice and its first admin")]
    Create {
        #[arg(help = "Practice name")]
        name: String,

        #[arg(long, help = "NHS ODS code")]
        ods_code: Option<String>,

        #[arg(long, help = "Admin email address")]
        admin_email: String,

        #[arg(long, help = "Admin display name")]
        admin_name: String,

        #[arg(long, env = "GPC_ADMIN_PASSWORD", hide_env_values = true, help = "Admin password")]
        admin_password: String,
    },
}

pub async fn handle(cmd: PracticeCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let service = PracticeService::new(DatabaseManager::pool()?);

    match cmd {
        PracticeCommands::List => {
            let practices = service.list_practices().await?;
            if practices.is_empty() {
                return output_empty_collection(output_format, "practices", "No practices registered");
            }
            match output_format {
                OutputFormat::Json => output_json(&json!({ "practices": practices }))?,
                OutputFormat::Text => {
                    println!("{:<38} {:<30} {:<10} {}", "ID", "NAME", "ODS", "ACTIVE");
                    println!("{}", "-".repeat(86));
                    for p in &practices {
                        println!(
                            "{:<38} {:<30} {:<10} {}",
                            p.id,
                            p.name,
                            p.ods_code.as_deref().unwrap_or("-"),
                            if p.is_usable() { "yes" } else { "no" }
                        );
                    }
                }
            }
            Ok(())
        }
        PracticeCommands::Create { name, ods_code, admin_email, admin_name, admin_password } => {
            let practice = NewPractice { name, ods_code, ..Default::default() };
            let admin = NewUser { email: admin_email, name: admin_name, role: Role::Admin, password: admin_password };
            let (practice, user) = service.register(practice, admin).await?;
            output_success(
                output_format,
                &format!("Created practice '{}' with admin {}", practice.name, user.email),
                Some(json!({ "practice": practice, "user": user })),
            )
        }
    }
}
