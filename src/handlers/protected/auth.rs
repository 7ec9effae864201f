use axum::{extract::Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, PracticeScope};
use crate::services::practice_service::PracticeService;

/// GET /api/auth/me
pub async fn me(Extension(scope): Extension<PracticeScope>) -> ApiResult<Value> {
    let service = PracticeService::new(DatabaseManager::pool()?);
    let user = service
        .get_user(scope.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let practice = service.get_practice(scope.practice_id).await?;
    Ok(ApiResponse::success(json!({ "user": user, "practice": practice })))
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

/// PUT /api/auth/password
pub async fn change_password(
    Extension(scope): Extension<PracticeScope>,
    Json(body): Json<PasswordChange>,
) -> ApiResult<Value> {
    PracticeService::new(DatabaseManager::pool()?)
        .change_password(scope.user_id, &body.current_password, &body.new_password)
        .await?;
    tracing::info!("Password changed for {}", scope.email);
    Ok(ApiResponse::success(json!({ "changed": true })))
}
