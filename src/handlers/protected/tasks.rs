use axum::{
    extract::{Extension, Path},
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::config;
use crate::database::entity::TASKS;
use crate::database::DatabaseManager;
use crate::middleware::{ApiResponse, ApiResult, PracticeScope};
use crate::observer::today;
use crate::services::task_service::{self, with_rag, CompleteTask};

/// POST /api/tasks/:id/complete - body is optional
pub async fn complete(
    Extension(scope): Extension<PracticeScope>,
    Path(id): Path<Uuid>,
    body: Option<Json<CompleteTask>>,
) -> ApiResult<Value> {
    scope.require(TASKS.write_role)?;
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let repository = scope.repository(&TASKS, DatabaseManager::pool()?);
    let task = task_service::complete(repository, scope.actor(), id, request).await?;
    Ok(ApiResponse::success(with_rag(task, today(), config::config().compliance.task_amber_days)))
}
