// Ring 1: required columns must be present on create and never cleared
use async_trait::async_trait;
use serde_json::Value;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{GenericObserver, Observer, ObserverRing};
use crate::types::Operation;

pub struct RequiredFields;

impl Observer for RequiredFields {
    fn name(&self) -> &'static str {
        "required_fields"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Validation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn priority(&self) -> u8 {
        20
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

#[async_trait]
impl GenericObserver for RequiredFields {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let missing: Vec<String> = ctx
            .entity()
            .required_columns()
            .filter(|column| match ctx.operation {
                Operation::Create => is_blank(ctx.input.get(column.name)),
                _ => ctx.has_input(column.name) && is_blank(ctx.input.get(column.name)),
            })
            .map(|column| column.name.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ObserverError::RequiredFields(missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entity::TASKS;
    use crate::testing::observer_context;
    use serde_json::json;

    #[tokio::test]
    async fn create_requires_every_required_column() {
        let mut ctx = observer_context(&TASKS, Operation::Create, json!({ "title": "  " }), None);
        match RequiredFields.execute(&mut ctx).await {
            Err(ObserverError::RequiredFields(fields)) => assert_eq!(fields, vec!["title", "due_date"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn update_only_checks_supplied_fields() {
        let existing = json!({ "title": "Legionella flush", "due_date": "2024-06-01" });
        let mut ctx = observer_context(&TASKS, Operation::Update, json!({ "status": "completed" }), Some(existing.clone()));
        assert!(RequiredFields.execute(&mut ctx).await.is_ok());

        let mut ctx = observer_context(&TASKS, Operation::Update, json!({ "title": null }), Some(existing));
        assert!(matches!(
            RequiredFields.execute(&mut ctx).await,
            Err(ObserverError::RequiredFields(_))
        ));
    }
}
