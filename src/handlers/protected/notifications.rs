use axum::extract::{Extension, Path, Query};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::Notification;
use crate::database::DatabaseManager;
use crate::middleware::{ApiResponse, ApiResult, PracticeScope};
use crate::services::notification_service::NotificationService;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
    pub limit: Option<i64>,
}

/// GET /api/notifications?unread=true - the caller's notifications, newest first
pub async fn list(
    Extension(scope): Extension<PracticeScope>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Value> {
    let service = NotificationService::new(DatabaseManager::pool()?);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let notifications = service.list_for_user(scope.user_id, query.unread, limit).await?;
    let unread = service.unread_count(scope.user_id).await?;
    Ok(ApiResponse::success(json!({ "notifications": notifications, "unread": unread })))
}

/// POST /api/notifications/:id/read
pub async fn mark_read(Extension(scope): Extension<PracticeScope>, Path(id): Path<Uuid>) -> ApiResult<Notification> {
    let notification = NotificationService::new(DatabaseManager::pool()?)
        .mark_read(scope.user_id, id)
        .await?;
    Ok(ApiResponse::success(notification))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(Extension(scope): Extension<PracticeScope>) -> ApiResult<Value> {
    let updated = NotificationService::new(DatabaseManager::pool()?)
        .mark_all_read(scope.user_id)
        .await?;
    Ok(ApiResponse::success(json!({ "updated": updated })))
}
