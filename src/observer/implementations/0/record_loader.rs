// Ring 0: Data Preparation - load the stored row before it is changed
use async_trait::async_trait;
use serde_json::Value;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{GenericObserver, Observer, ObserverRing};
use crate::types::Operation;

pub struct RecordLoader;

impl Observer for RecordLoader {
    fn name(&self) -> &'static str {
        "record_loader"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::DataPreparation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Update | Operation::Delete)
    }
}

#[async_trait]
impl GenericObserver for RecordLoader {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        if ctx.existing.is_some() {
            return Ok(());
        }

        let id = ctx
            .record_id
            .ok_or_else(|| ObserverError::validation("id", "record id is required"))?;

        match ctx.repository.get_optional(id).await? {
            Some(Value::Object(row)) => {
                ctx.existing = Some(row);
                Ok(())
            }
            _ => Err(ObserverError::NotFound(format!(
                "{} {} not found",
                ctx.entity().entity_type,
                id
            ))),
        }
    }
}
