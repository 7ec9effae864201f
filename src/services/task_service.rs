use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::database::repository::Repository;
use crate::observer::{Actor, ObserverError, PIPELINE};
use crate::types::RagStatus;

/// Completed is green; overdue is red; due within `amber_days` is amber
pub fn task_rag(status: &str, due_date: NaiveDate, today: NaiveDate, amber_days: i64) -> RagStatus {
    if status == "completed" {
        return RagStatus::Green;
    }
    let days_left = (due_date - today).num_days();
    if days_left < 0 {
        RagStatus::Red
    } else if days_left <= amber_days {
        RagStatus::Amber
    } else {
        RagStatus::Green
    }
}

/// Annotate a task record with its RAG status
pub fn with_rag(mut task: Value, today: NaiveDate, amber_days: i64) -> Value {
    let status = task.get("status").and_then(Value::as_str).unwrap_or("pending").to_string();
    let due = task
        .get("due_date")
        .and_then(Value::as_str)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
    if let (Some(due), Some(obj)) = (due, task.as_object_mut()) {
        let rag = task_rag(&status, due, today, amber_days);
        obj.insert("rag".into(), serde_json::to_value(rag).unwrap_or(Value::Null));
    }
    task
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteTask {
    pub evidence_notes: Option<String>,
}

/// Mark a task completed through the observer pipeline so completion
/// stamps and recurrence apply exactly as for a PATCH
pub async fn complete(
    repository: Repository,
    actor: Actor,
    id: Uuid,
    request: CompleteTask,
) -> Result<Value, ObserverError> {
    let mut changes = Map::new();
    changes.insert("status".into(), Value::String("completed".into()));
    if let Some(notes) = request.evidence_notes.filter(|n| !n.trim().is_empty()) {
        changes.insert("evidence_notes".into(), Value::String(notes));
    }
    PIPELINE.update(repository, actor, id, changes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[test]
    fn rag_by_due_date() {
        assert_eq!(task_rag("pending", d(9), d(10), 7), RagStatus::Red);
        assert_eq!(task_rag("pending", d(10), d(10), 7), RagStatus::Amber);
        assert_eq!(task_rag("in_progress", d(17), d(10), 7), RagStatus::Amber);
        assert_eq!(task_rag("pending", d(18), d(10), 7), RagStatus::Green);
        assert_eq!(task_rag("completed", d(1), d(10), 7), RagStatus::Green);
    }

    #[test]
    fn records_are_annotated() {
        let task = with_rag(json!({ "status": "pending", "due_date": "2024-06-01" }), d(10), 7);
        assert_eq!(task["rag"], "red");
        let task = with_rag(json!({ "status": "pending" }), d(10), 7);
        assert!(task.get("rag").is_none());
    }
}
