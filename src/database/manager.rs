use once_cell::sync::OnceCell;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::filter::FilterError;

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid value for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DatabaseError::Validation { field: field.into(), message: message.into() }
    }
}

/// Owns the process-wide connection pool. The pool connects lazily so the
/// server can start (and report degraded health) before Postgres is up.
pub struct DatabaseManager;

static POOL: OnceCell<PgPool> = OnceCell::new();

impl DatabaseManager {
    pub fn pool() -> Result<PgPool, DatabaseError> {
        POOL.get_or_try_init(Self::build_pool).cloned()
    }

    fn build_pool() -> Result<PgPool, DatabaseError> {
        let config = &crate::config::config().database;
        let url = Self::validate_url(&config.url)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_lazy(&url)?;

        info!(
            "Created database pool for {} (max {} connections)",
            Self::redacted(&url),
            config.max_connections
        );
        Ok(pool)
    }

    /// Only `postgres://` / `postgresql://` URLs naming a database are accepted
    fn validate_url(raw: &str) -> Result<String, DatabaseError> {
        if raw.trim().is_empty() {
            return Err(DatabaseError::ConfigMissing("DATABASE_URL"));
        }
        let url = url::Url::parse(raw).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(DatabaseError::InvalidDatabaseUrl);
        }
        if url.path().trim_start_matches('/').is_empty() {
            return Err(DatabaseError::InvalidDatabaseUrl);
        }
        Ok(url.into())
    }

    /// Strip credentials before logging
    fn redacted(raw: &str) -> String {
        match url::Url::parse(raw) {
            Ok(mut url) => {
                let _ = url.set_password(None);
                let _ = url.set_username("");
                url.into()
            }
            Err(_) => "<invalid url>".to_string(),
        }
    }

    /// Apply the embedded migrations under `migrations/`
    pub async fn migrate() -> Result<(), DatabaseError> {
        let pool = Self::pool()?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check() -> Result<(), DatabaseError> {
        let pool = Self::pool()?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    /// Close the pool on shutdown
    pub async fn close() {
        if let Some(pool) = POOL.get() {
            pool.close().await;
            info!("Closed database pool");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_database_urls() {
        assert!(DatabaseManager::validate_url("postgres://u:p@localhost:5432/gp").is_ok());
        assert!(DatabaseManager::validate_url("postgresql://localhost/gp?sslmode=disable").is_ok());
        assert!(matches!(
            DatabaseManager::validate_url(""),
            Err(DatabaseError::ConfigMissing(_))
        ));
        assert!(DatabaseManager::validate_url("mysql://localhost/gp").is_err());
        assert!(DatabaseManager::validate_url("postgres://localhost/").is_err());
        assert!(DatabaseManager::validate_url("not a url").is_err());
    }

    #[test]
    fn redacts_credentials() {
        let shown = DatabaseManager::redacted("postgres://admin:hunter2@db:5432/gp");
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("admin"));
        assert!(shown.ends_with("db:5432/gp"));
    }
}
