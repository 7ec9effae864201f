// Ring 4: stamp who completed a task and when
use async_trait::async_trait;
use serde_json::Value;

use crate::observer::context::{now_timestamp, ObserverContext};
use crate::observer::error::ObserverError;
use crate::observer::traits::{GenericObserver, Observer, ObserverRing};
use crate::types::Operation;

pub struct TaskCompletion;

impl Observer for TaskCompletion {
    fn name(&self) -> &'static str {
        "task_completion"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn tables(&self) -> &'static [&'static str] {
        &["tasks"]
    }
}

#[async_trait]
impl GenericObserver for TaskCompletion {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        if ctx.transitions_to("status", "completed") {
            ctx.set("completed_at", now_timestamp());
            ctx.set("completed_by", Value::String(ctx.actor.user_id.to_string()));
        } else if ctx.transitions_from("status", "completed") {
            // reopened
            ctx.set("completed_at", Value::Null);
            ctx.set("completed_by", Value::Null);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entity::TASKS;
    use crate::testing::observer_context;
    use serde_json::json;

    #[tokio::test]
    async fn completion_is_stamped_once() {
        let existing = json!({ "status": "in_progress", "due_date": "2024-06-01" });
        let mut ctx = observer_context(&TASKS, Operation::Update, json!({ "status": "completed" }), Some(existing));
        TaskCompletion.execute(&mut ctx).await.unwrap();
        assert!(ctx.input["completed_at"].is_string());
        assert_eq!(ctx.input["completed_by"], json!(ctx.actor.user_id.to_string()));

        let existing = json!({ "status": "completed", "completed_at": "2024-06-01T09:00:00Z" });
        let mut ctx = observer_context(&TASKS, Operation::Update, json!({ "status": "completed" }), Some(existing));
        TaskCompletion.execute(&mut ctx).await.unwrap();
        assert!(!ctx.has_input("completed_at"));
    }

    #[tokio::test]
    async fn reopening_clears_completion() {
        let existing = json!({ "status": "completed", "completed_at": "2024-06-01T09:00:00Z" });
        let mut ctx = observer_context(&TASKS, Operation::Update, json!({ "status": "pending" }), Some(existing));
        TaskCompletion.execute(&mut ctx).await.unwrap();
        assert!(ctx.input["completed_at"].is_null());
    }
}
