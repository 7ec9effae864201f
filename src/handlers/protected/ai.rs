use axum::{
    extract::{Extension, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::entity::{EntityDef, COMPLAINTS, INCIDENTS, TASKS};
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::handlers::Integrations;
use crate::jobs::ai::{improvement_messages, store_suggestion, task_assist_messages, TaskAssistRequest};
use crate::jobs::{AiClient, AiError};
use crate::middleware::{ApiResponse, ApiResult, PracticeScope};

fn client(integrations: &Integrations) -> Result<Arc<dyn AiClient>, ApiError> {
    integrations.ai.clone().ok_or_else(|| AiError::NotConfigured.into())
}

/// Incidents and complaints are the records suggestions can be made for
pub fn suggestion_entity(entity_type: &str) -> Result<&'static EntityDef, ApiError> {
    match entity_type {
        "incident" => Ok(&INCIDENTS),
        "complaint" => Ok(&COMPLAINTS),
        _ => Err(ApiError::field_error("entity_type", "must be incident or complaint")),
    }
}

/// POST /api/ai/task-assist
pub async fn task_assist(
    State(integrations): State<Integrations>,
    Extension(scope): Extension<PracticeScope>,
    Json(body): Json<TaskAssistRequest>,
) -> ApiResult<Value> {
    let ai = client(&integrations)?;
    if body.message.trim().is_empty() {
        return Err(ApiError::field_error("message", "must not be blank"));
    }
    let task = scope.repository(&TASKS, DatabaseManager::pool()?).get(body.task_id).await?;
    let reply = ai.complete(task_assist_messages(&task, &body)).await?;
    Ok(ApiResponse::success(json!({ "reply": reply, "model": ai.model() })))
}

#[derive(Debug, Deserialize)]
pub struct SuggestionRequest {
    pub entity_type: String,
    pub entity_id: Uuid,
}

/// POST /api/ai/improvement-suggestions - stored for later review
pub async fn improvement_suggestions(
    State(integrations): State<Integrations>,
    Extension(scope): Extension<PracticeScope>,
    Json(body): Json<SuggestionRequest>,
) -> ApiResult<Value> {
    let ai = client(&integrations)?;
    let entity = suggestion_entity(&body.entity_type)?;
    scope.require(entity.read_role)?;

    let pool = DatabaseManager::pool()?;
    let record = scope.repository(entity, pool.clone()).get(body.entity_id).await?;
    let content = ai.complete(improvement_messages(entity.entity_type, &record)).await?;
    let suggestion = store_suggestion(
        &pool,
        scope.practice_id,
        entity.entity_type,
        body.entity_id,
        &content,
        ai.model(),
        scope.user_id,
    )
    .await?;
    Ok(ApiResponse::created(suggestion))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_incidents_and_complaints_take_suggestions() {
        assert_eq!(suggestion_entity("incident").unwrap().table, "incidents");
        assert_eq!(suggestion_entity("complaint").unwrap().table, "complaints");
        assert!(suggestion_entity("task").is_err());
    }

    #[test]
    fn missing_client_is_service_unavailable() {
        let integrations = Integrations { mailer: Arc::new(crate::jobs::mailer::LogMailer), ai: None };
        assert!(matches!(client(&integrations), Err(ApiError::ServiceUnavailable(_))));
    }
}
