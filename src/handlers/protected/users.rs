use axum::{
    extract::{Extension, Path},
    Json,
};
use uuid::Uuid;

use crate::database::models::User;
use crate::database::DatabaseManager;
use crate::middleware::{ApiResponse, ApiResult, PracticeScope};
use crate::services::practice_service::{NewUser, PracticeService, UserChanges};
use crate::types::Role;

/// GET /api/users
pub async fn list(Extension(scope): Extension<PracticeScope>) -> ApiResult<Vec<User>> {
    scope.require(Role::Manager)?;
    let users = PracticeService::new(DatabaseManager::pool()?)
        .list_users(scope.practice_id)
        .await?;
    Ok(ApiResponse::success(users))
}

/// POST /api/users
pub async fn create(Extension(scope): Extension<PracticeScope>, Json(body): Json<NewUser>) -> ApiResult<User> {
    scope.require(Role::Admin)?;
    let user = PracticeService::new(DatabaseManager::pool()?)
        .create_user(scope.practice_id, scope.role, body)
        .await?;
    tracing::info!("{} created user {} as {}", scope.email, user.email, user.role);
    Ok(ApiResponse::created(user))
}

/// PATCH /api/users/:id
pub async fn update(
    Extension(scope): Extension<PracticeScope>,
    Path(id): Path<Uuid>,
    Json(body): Json<UserChanges>,
) -> ApiResult<User> {
    scope.require(Role::Admin)?;
    let user = PracticeService::new(DatabaseManager::pool()?)
        .update_user(scope.practice_id, (scope.user_id, scope.role), id, body)
        .await?;
    Ok(ApiResponse::success(user))
}

/// DELETE /api/users/:id - deactivates, never removes
pub async fn deactivate(Extension(scope): Extension<PracticeScope>, Path(id): Path<Uuid>) -> ApiResult<User> {
    scope.require(Role::Admin)?;
    let user = PracticeService::new(DatabaseManager::pool()?)
        .deactivate_user(scope.practice_id, (scope.user_id, scope.role), id)
        .await?;
    tracing::info!("{} deactivated user {}", scope.email, user.email);
    Ok(ApiResponse::success(user))
}
