use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub const CRON_SECRET: &str = "integration-cron-secret";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    #[allow(dead_code)]
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // The server loads .env itself, so DATABASE_URL is inherited when present.
        // Without a reachable database the API still starts and reports 503 on /health.
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_gp-compliance-api"));
        cmd.env("PORT", port.to_string())
            .env("APP_ENV", "development")
            .env("JWT_SECRET", "integration-jwt-secret")
            .env("CRON_SECRET", CRON_SECRET)
            .env("SCHEDULER_ENABLED", "false")
            .env("DATABASE_RUN_MIGRATIONS", "false")
            .env("DATABASE_CONNECTION_TIMEOUT", "1")
            .env("RUST_LOG", "warn")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;
        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(15)).await?;
    Ok(server)
}

/// `DATABASE_URL` from the environment or `.env`, if any
#[allow(dead_code)]
pub fn database_url() -> Option<String> {
    dotenvy::dotenv().ok();
    std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty())
}

/// Migrated pool for tests that need Postgres, one per test runtime.
/// None (and the test is skipped) when no database is configured.
#[allow(dead_code)]
pub async fn database() -> Option<PgPool> {
    let Some(url) = database_url() else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&url)
        .await
        .expect("DATABASE_URL is set but the database is unreachable");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrations apply");
    Some(pool)
}

/// A freshly registered practice and its admin
#[allow(dead_code)]
pub struct Seeded {
    pub practice: gp_compliance_api::database::models::Practice,
    pub admin: gp_compliance_api::database::models::User,
}

#[allow(dead_code)]
pub async fn seed_practice(pool: &PgPool) -> Seeded {
    use gp_compliance_api::services::practice_service::{NewPractice, NewUser, PracticeService};
    use gp_compliance_api::types::Role;

    let tag = uuid::Uuid::new_v4().simple().to_string();
    let (practice, admin) = PracticeService::new(pool.clone())
        .register(
            NewPractice { name: format!("Practice {}", &tag[..8]), ..Default::default() },
            NewUser {
                email: format!("admin-{}@example.com", tag),
                name: "Practice Admin".into(),
                role: Role::Admin,
                password: "integration-password".into(),
            },
        )
        .await
        .expect("practice registers");
    Seeded { practice, admin }
}

#[allow(dead_code)]
pub async fn seed_employee(pool: &PgPool, practice_id: uuid::Uuid, name: &str, user_id: Option<uuid::Uuid>) -> uuid::Uuid {
    let (id,): (uuid::Uuid,) =
        sqlx::query_as("INSERT INTO employees (practice_id, name, user_id) VALUES ($1, $2, $3) RETURNING id")
            .bind(practice_id)
            .bind(name)
            .bind(user_id)
            .fetch_one(pool)
            .await
            .expect("employee inserts");
    id
}
