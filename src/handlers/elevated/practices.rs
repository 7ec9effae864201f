use axum::{
    extract::{Extension, Path},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::Practice;
use crate::database::DatabaseManager;
use crate::middleware::{ApiResponse, ApiResult, PracticeScope};
use crate::services::practice_service::{NewPractice, NewUser, PracticeChanges, PracticeService};
use crate::types::Role;

/// GET /api/admin/practices
pub async fn list(Extension(scope): Extension<PracticeScope>) -> ApiResult<Vec<Practice>> {
    scope.require(Role::Master)?;
    let practices = PracticeService::new(DatabaseManager::pool()?).list_practices().await?;
    Ok(ApiResponse::success(practices))
}

#[derive(Debug, Deserialize)]
pub struct PracticeSignup {
    pub practice: NewPractice,
    pub admin: NewUser,
}

/// POST /api/admin/practices - practice plus its first admin
pub async fn create(Extension(scope): Extension<PracticeScope>, Json(body): Json<PracticeSignup>) -> ApiResult<Value> {
    scope.require(Role::Master)?;
    let (practice, user) = PracticeService::new(DatabaseManager::pool()?)
        .register(body.practice, body.admin)
        .await?;
    tracing::info!("Master {} created practice {} ({})", scope.email, practice.name, practice.id);
    Ok(ApiResponse::created(json!({ "practice": practice, "user": user })))
}

/// PATCH /api/admin/practices/:id - includes activation
pub async fn update(
    Extension(scope): Extension<PracticeScope>,
    Path(id): Path<Uuid>,
    Json(body): Json<PracticeChanges>,
) -> ApiResult<Practice> {
    scope.require(Role::Master)?;
    let practice = PracticeService::new(DatabaseManager::pool()?)
        .update_practice(id, body)
        .await?;
    Ok(ApiResponse::success(practice))
}
