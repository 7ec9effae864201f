use axum::extract::{Extension, Query};
use chrono::NaiveDate;
use serde::Deserialize;

use super::compliance::resolve_period;
use crate::config;
use crate::database::entity::MEDICAL_REQUESTS;
use crate::database::DatabaseManager;
use crate::middleware::{ApiResponse, ApiResult, PracticeScope};
use crate::observer::today;
use crate::services::medical_request_service::{MedicalRequestReport, MedicalRequestService};

#[derive(Debug, Deserialize)]
pub struct ReportRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// GET /api/reports/medical-requests?from=&to=
pub async fn medical_requests(
    Extension(scope): Extension<PracticeScope>,
    Query(range): Query<ReportRange>,
) -> ApiResult<MedicalRequestReport> {
    scope.require(MEDICAL_REQUESTS.read_role)?;
    let today = today();
    let (from, to) = resolve_period(range.from, range.to, today, config::config().compliance.default_window_days)?;

    let report = MedicalRequestService::new(DatabaseManager::pool()?)
        .report(scope.practice_id, from, to, today)
        .await?;
    Ok(ApiResponse::success(report))
}
