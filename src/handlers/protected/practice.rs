use axum::{extract::Extension, Json};

use crate::database::models::Practice;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, PracticeScope};
use crate::services::practice_service::{PracticeChanges, PracticeService};
use crate::types::Role;

/// GET /api/practice
pub async fn get(Extension(scope): Extension<PracticeScope>) -> ApiResult<Practice> {
    let practice = PracticeService::new(DatabaseManager::pool()?)
        .get_practice(scope.practice_id)
        .await?;
    Ok(ApiResponse::success(practice))
}

/// PATCH /api/practice - details only; activation is a master decision
pub async fn update(Extension(scope): Extension<PracticeScope>, Json(body): Json<PracticeChanges>) -> ApiResult<Practice> {
    scope.require(Role::Admin)?;
    if body.is_active.is_some() && scope.role != Role::Master {
        return Err(ApiError::forbidden("Only a master can change practice activation"));
    }
    let practice = PracticeService::new(DatabaseManager::pool()?)
        .update_practice(scope.practice_id, body)
        .await?;
    Ok(ApiResponse::success(practice))
}
