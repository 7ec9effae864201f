//! Generic CRUD over the entity registry: `/api/<entity>[/<id>]`.
//! Writes go through the observer pipeline; reads go straight to the repository.

use axum::{
    extract::{Extension, Path, Query},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config;
use crate::database::entity::{EntityDef, TASKS};
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::{ApiResponse, ApiResult, PracticeScope};
use crate::observer::{today, PIPELINE};
use crate::services::task_service::with_rag;
use crate::types::Role;

/// Total rows matching a list filter, ignoring limit and offset
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Registry entry served by a route, attached as a layer per entity
#[derive(Clone, Copy)]
pub struct EntityRoute(pub &'static EntityDef);

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// JSON-encoded where clause
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
    /// `"due_date desc"` or a JSON order spec
    pub order: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

pub fn filter_from_query(query: ListQuery) -> Result<FilterData, ApiError> {
    let where_clause = match query.where_clause.as_deref().map(str::trim).filter(|w| !w.is_empty()) {
        Some(raw) => Some(
            serde_json::from_str::<Value>(raw)
                .map_err(|e| ApiError::bad_request(format!("Invalid where parameter: {}", e)))?,
        ),
        None => None,
    };
    let order = query
        .order
        .as_deref()
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|raw| match raw.chars().next() {
            Some('[') | Some('{') => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
            _ => Value::String(raw.to_string()),
        });
    Ok(FilterData {
        select: None,
        where_clause,
        order,
        limit: query.limit,
        offset: query.offset,
    })
}

pub fn into_object(body: Value) -> Result<Map<String, Value>, ApiError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::bad_request("Request body must be a JSON object")),
    }
}

fn check_writable(entity: &EntityDef, scope: &PracticeScope, role: Role) -> Result<(), ApiError> {
    if entity.read_only {
        return Err(ApiError::forbidden(format!("{} records cannot be changed directly", entity.entity_type)));
    }
    scope.require(role)
}

/// Tasks carry a computed RAG status on the way out
fn present(entity: &EntityDef, record: Value) -> Value {
    if entity.table == TASKS.table {
        with_rag(record, today(), config::config().compliance.task_amber_days)
    } else {
        record
    }
}

/// GET /api/:entity?where=&order=&limit=&offset=
pub async fn list(
    Extension(EntityRoute(entity)): Extension<EntityRoute>,
    Extension(scope): Extension<PracticeScope>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    scope.require(entity.read_role)?;
    let filter = filter_from_query(query)?;
    let repository = scope.repository(entity, DatabaseManager::pool()?);
    let total = repository.count(filter.clone()).await?;
    let records: Vec<Value> = repository.list(filter).await?.into_iter().map(|r| present(entity, r)).collect();
    Ok(([(TOTAL_COUNT_HEADER, total.to_string())], ApiResponse::success(records)).into_response())
}

/// POST /api/:entity/find - filter in the body
pub async fn find(
    Extension(EntityRoute(entity)): Extension<EntityRoute>,
    Extension(scope): Extension<PracticeScope>,
    Json(filter): Json<FilterData>,
) -> ApiResult<Vec<Value>> {
    scope.require(entity.read_role)?;
    let records = scope.repository(entity, DatabaseManager::pool()?).list(filter).await?;
    Ok(ApiResponse::success(records.into_iter().map(|r| present(entity, r)).collect()))
}

/// GET /api/:entity/:id
pub async fn get(
    Extension(EntityRoute(entity)): Extension<EntityRoute>,
    Extension(scope): Extension<PracticeScope>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    scope.require(entity.read_role)?;
    let record = scope.repository(entity, DatabaseManager::pool()?).get(id).await?;
    Ok(ApiResponse::success(present(entity, record)))
}

/// POST /api/:entity
pub async fn create(
    Extension(EntityRoute(entity)): Extension<EntityRoute>,
    Extension(scope): Extension<PracticeScope>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    check_writable(entity, &scope, entity.write_role)?;
    let repository = scope.repository(entity, DatabaseManager::pool()?);
    let record = PIPELINE.create(repository, scope.actor(), into_object(body)?).await?;
    Ok(ApiResponse::created(present(entity, record)))
}

/// PUT|PATCH /api/:entity/:id - partial update
pub async fn update(
    Extension(EntityRoute(entity)): Extension<EntityRoute>,
    Extension(scope): Extension<PracticeScope>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    check_writable(entity, &scope, entity.write_role)?;
    let repository = scope.repository(entity, DatabaseManager::pool()?);
    let record = PIPELINE.update(repository, scope.actor(), id, into_object(body)?).await?;
    Ok(ApiResponse::success(present(entity, record)))
}

/// DELETE /api/:entity/:id - soft delete where the entity supports it
pub async fn delete(
    Extension(EntityRoute(entity)): Extension<EntityRoute>,
    Extension(scope): Extension<PracticeScope>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    check_writable(entity, &scope, entity.delete_role)?;
    let repository = scope.repository(entity, DatabaseManager::pool()?);
    let record = PIPELINE.delete(repository, scope.actor(), id).await?;
    Ok(ApiResponse::success(record))
}
