// Ring 1: reject fields clients may not write
use async_trait::async_trait;

use crate::database::repository::check_client_writable;
use crate::database::DatabaseError;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{GenericObserver, Observer, ObserverRing};
use crate::types::Operation;

pub struct WritableFields;

impl Observer for WritableFields {
    fn name(&self) -> &'static str {
        "writable_fields"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Validation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn priority(&self) -> u8 {
        10
    }
}

#[async_trait]
impl GenericObserver for WritableFields {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        if ctx.entity().read_only {
            return Err(ObserverError::Forbidden(format!(
                "{} records cannot be modified",
                ctx.entity().entity_type
            )));
        }
        check_client_writable(ctx.entity(), &ctx.input).map_err(|e| match e {
            DatabaseError::Validation { field, message } => ObserverError::ValidationError { field, message },
            other => other.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entity::{AUDIT_LOGS, TASKS};
    use crate::testing::observer_context;
    use serde_json::json;

    #[tokio::test]
    async fn read_only_fields_are_rejected() {
        let mut ctx = observer_context(&TASKS, Operation::Update, json!({ "completed_by": null }), None);
        let err = WritableFields.execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, ObserverError::ValidationError { ref field, .. } if field == "completed_by"));
    }

    #[tokio::test]
    async fn read_only_entities_are_forbidden() {
        let mut ctx = observer_context(&AUDIT_LOGS, Operation::Create, json!({}), None);
        assert!(matches!(
            WritableFields.execute(&mut ctx).await,
            Err(ObserverError::Forbidden(_))
        ));
    }
}
