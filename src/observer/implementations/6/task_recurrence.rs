// Ring 6: completing a recurring task schedules its next occurrence
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::str::FromStr;
use uuid::Uuid;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{GenericObserver, Observer, ObserverRing};
use crate::types::{Operation, TaskFrequency};

/// Fields carried over from the completed task
const CARRIED: [&str; 6] = ["title", "description", "category", "assigned_to", "frequency", "tags"];

/// Build the next occurrence of a completed task, or None for one-off tasks
pub fn next_occurrence(completed: &Value) -> Option<Map<String, Value>> {
    let frequency = completed
        .get("frequency")
        .and_then(Value::as_str)
        .and_then(|f| TaskFrequency::from_str(f).ok())?;
    let due_date = completed
        .get("due_date")
        .and_then(Value::as_str)
        .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())?;
    let next_due = frequency.next_due_date(due_date)?;

    let mut next = Map::new();
    for field in CARRIED {
        if let Some(value) = completed.get(field).filter(|v| !v.is_null()) {
            next.insert(field.to_string(), value.clone());
        }
    }
    next.insert("due_date".into(), Value::String(next_due.to_string()));
    next.insert("status".into(), Value::String("pending".into()));
    if let Some(steps) = completed.get("steps").and_then(Value::as_array) {
        next.insert("steps".into(), Value::Array(steps.iter().map(reset_step).collect()));
    }
    if let Some(id) = completed.get("id").filter(|v| !v.is_null()) {
        next.insert("parent_task_id".into(), id.clone());
    }
    Some(next)
}

/// Checklist steps start unticked on the new occurrence
fn reset_step(step: &Value) -> Value {
    match step {
        Value::Object(obj) => {
            let mut obj = obj.clone();
            if obj.contains_key("completed") {
                obj.insert("completed".into(), Value::Bool(false));
            }
            obj.remove("completed_at");
            obj.remove("completed_by");
            Value::Object(obj)
        }
        other => other.clone(),
    }
}

pub struct TaskRecurrence;

impl Observer for TaskRecurrence {
    fn name(&self) -> &'static str {
        "task_recurrence"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::PostDatabase
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn tables(&self) -> &'static [&'static str] {
        &["tasks"]
    }
}

#[async_trait]
impl GenericObserver for TaskRecurrence {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        if !ctx.transitions_to("status", "completed") {
            return Ok(());
        }
        let Some(completed) = ctx.result.as_ref() else {
            return Ok(());
        };
        let Some(next) = next_occurrence(completed) else {
            return Ok(());
        };
        let Some(parent_id) = ctx.result_id() else {
            return Ok(());
        };

        // Reopening and completing again must not schedule a second copy
        let existing: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM tasks WHERE parent_task_id = $1 AND practice_id = $2 AND deleted_at IS NULL LIMIT 1",
        )
        .bind(parent_id)
        .bind(ctx.practice_id())
        .fetch_optional(ctx.repository.pool())
        .await
        .map_err(crate::database::DatabaseError::from)?;
        if existing.is_some() {
            tracing::debug!("Task {} already has a next occurrence", parent_id);
            return Ok(());
        }

        let created = ctx.repository.create(&next).await?;
        let created_id = created.get("id").and_then(Value::as_str).unwrap_or("-");
        let due_date = next.get("due_date").and_then(Value::as_str).unwrap_or("-");
        tracing::info!("Scheduled next occurrence {} of task {} due {}", created_id, parent_id, due_date);
        ctx.metadata.insert("next_task".into(), created);
        Ok(())
    }
}
