use axum::extract::Extension;

use crate::config;
use crate::database::DatabaseManager;
use crate::middleware::{ApiResponse, ApiResult, PracticeScope};
use crate::observer::today;
use crate::services::dashboard_service::{Dashboard, DashboardService};

/// GET /api/dashboard
pub async fn summary(Extension(scope): Extension<PracticeScope>) -> ApiResult<Dashboard> {
    let dashboard = DashboardService::new(DatabaseManager::pool()?)
        .summary(scope.practice_id, scope.user_id, today(), config::config())
        .await?;
    Ok(ApiResponse::success(dashboard))
}
