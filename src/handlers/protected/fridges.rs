use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::database::entity::{FRIDGES, FRIDGE_LOGS};
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, PracticeScope};
use crate::observer::{today, PIPELINE};
use crate::services::fridge_service::{FridgeService, FridgeStatus};

use super::entity::into_object;

#[derive(Debug, Deserialize)]
pub struct LogRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// GET /api/fridges/:id/logs?from=&to=
pub async fn logs(
    Extension(scope): Extension<PracticeScope>,
    Path(fridge_id): Path<Uuid>,
    Query(range): Query<LogRange>,
) -> ApiResult<Vec<Value>> {
    scope.require(FRIDGE_LOGS.read_role)?;
    if let (Some(from), Some(to)) = (range.from, range.to) {
        if from > to {
            return Err(ApiError::field_error("from", "must not be after to"));
        }
    }
    let service = FridgeService::new(DatabaseManager::pool()?);
    service
        .find(scope.practice_id, fridge_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("fridge {} not found", fridge_id)))?;
    let logs = service.logs(scope.practice_id, fridge_id, range.from, range.to).await?;
    Ok(ApiResponse::success(logs))
}

/// POST /api/fridges/:id/logs - record a reading for this fridge
pub async fn record_reading(
    Extension(scope): Extension<PracticeScope>,
    Path(fridge_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    scope.require(FRIDGE_LOGS.write_role)?;
    let mut reading = into_object(body)?;
    reading.insert("fridge_id".into(), Value::String(fridge_id.to_string()));
    let repository = scope.repository(&FRIDGE_LOGS, DatabaseManager::pool()?);
    let log = PIPELINE.create(repository, scope.actor(), reading).await?;
    Ok(ApiResponse::created(log))
}

/// GET /api/fridges/statuses - latest reading and RAG per active fridge
pub async fn statuses(Extension(scope): Extension<PracticeScope>) -> ApiResult<Vec<FridgeStatus>> {
    scope.require(FRIDGES.read_role)?;
    let statuses = FridgeService::new(DatabaseManager::pool()?)
        .statuses(scope.practice_id, today())
        .await?;
    Ok(ApiResponse::success(statuses))
}
