//! Scheduled job triggers for an external cron, guarded by a shared secret

use axum::{extract::State, http::HeaderMap};
use sha2::{Digest, Sha256};
use crate::config;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::handlers::Integrations;
use crate::jobs::{dispatch, reminders};
use crate::middleware::{ApiResponse, ApiResult};
use crate::observer::today;

pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

const DISPATCH_BATCH_SIZE: i64 = 200;

/// Constant-time comparison of the supplied secret against the configured one.
/// An empty configured secret disables the triggers.
pub fn check_cron_secret(headers: &HeaderMap, expected: &str) -> Result<(), ApiError> {
    if expected.is_empty() {
        return Err(ApiError::forbidden("Scheduled functions are disabled"));
    }
    let supplied = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing cron secret"))?;

    let a = Sha256::digest(supplied.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    let diff = a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    if diff != 0 {
        return Err(ApiError::unauthorized("Invalid cron secret"));
    }
    Ok(())
}

/// POST /functions/scheduled-reminders
pub async fn scheduled_reminders(headers: HeaderMap) -> ApiResult<reminders::ReminderSummary> {
    let config = config::config();
    check_cron_secret(&headers, &config.security.cron_secret)?;

    let pool = DatabaseManager::pool()?;
    let summary = reminders::run(&pool, &config.scheduler, today()).await?;
    Ok(ApiResponse::success(summary))
}

/// POST /functions/dispatch-emails
pub async fn dispatch_emails(
    State(integrations): State<Integrations>,
    headers: HeaderMap,
) -> ApiResult<dispatch::DispatchSummary> {
    let config = config::config();
    check_cron_secret(&headers, &config.security.cron_secret)?;

    let pool = DatabaseManager::pool()?;
    let summary = dispatch::run(&pool, integrations.mailer.clone(), &config.email.app_base_url, DISPATCH_BATCH_SIZE).await?;
    Ok(ApiResponse::success(summary))
}
