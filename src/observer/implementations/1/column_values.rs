// Ring 1: type and enum checks for every supplied value
use async_trait::async_trait;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{GenericObserver, Observer, ObserverRing};
use crate::types::Operation;

pub struct ColumnValues;

impl Observer for ColumnValues {
    fn name(&self) -> &'static str {
        "column_values"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Validation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn priority(&self) -> u8 {
        30
    }
}

#[async_trait]
impl GenericObserver for ColumnValues {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let entity = ctx.entity();
        for (name, value) in &ctx.input {
            // unknown names are reported by writable_fields
            let Some(column) = entity.column(name) else { continue };
            column
                .bind(value)
                .map_err(|message| ObserverError::validation(name.as_str(), message))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entity::{INCIDENTS, TASKS};
    use crate::testing::observer_context;
    use serde_json::json;

    #[tokio::test]
    async fn bad_dates_and_enum_values_are_rejected() {
        let mut ctx = observer_context(&TASKS, Operation::Create, json!({ "due_date": "next week" }), None);
        assert!(ColumnValues.execute(&mut ctx).await.is_err());

        let mut ctx = observer_context(&INCIDENTS, Operation::Create, json!({ "severity": "apocalyptic" }), None);
        let err = ColumnValues.execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, ObserverError::ValidationError { ref field, .. } if field == "severity"));

        let mut ctx = observer_context(&TASKS, Operation::Create, json!({ "frequency": "monthly", "tags": ["cqc"] }), None);
        assert!(ColumnValues.execute(&mut ctx).await.is_ok());
    }
}
