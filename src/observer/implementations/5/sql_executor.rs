// Ring 5: write the prepared record through the repository
use async_trait::async_trait;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{GenericObserver, Observer, ObserverRing};
use crate::types::Operation;

pub struct SqlExecutor;

impl Observer for SqlExecutor {
    fn name(&self) -> &'static str {
        "sql_executor"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Database
    }
}

#[async_trait]
impl GenericObserver for SqlExecutor {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let record = match (ctx.operation, ctx.record_id) {
            (Operation::Create, _) => ctx.repository.create(&ctx.input).await?,
            (Operation::Update, Some(id)) => ctx.repository.update(id, &ctx.input).await?,
            (Operation::Delete, Some(id)) => ctx.repository.delete(id).await?,
            (op, None) => {
                return Err(ObserverError::validation("id", format!("{:?} requires a record id", op)));
            }
        };

        tracing::debug!(
            "{} {:?} written: {}",
            ctx.entity().entity_type,
            ctx.operation,
            record.get("id").and_then(|v| v.as_str()).unwrap_or("-")
        );
        ctx.result = Some(record);
        Ok(())
    }
}
