// Ring 4: incident reporter and resolution timestamp
use async_trait::async_trait;
use serde_json::Value;

use crate::observer::context::{now_timestamp, ObserverContext};
use crate::observer::error::ObserverError;
use crate::observer::traits::{GenericObserver, Observer, ObserverRing};
use crate::types::Operation;

const RESOLVED_STATUSES: [&str; 2] = ["resolved", "closed"];

pub struct IncidentResolution;

impl Observer for IncidentResolution {
    fn name(&self) -> &'static str {
        "incident_resolution"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn tables(&self) -> &'static [&'static str] {
        &["incidents"]
    }
}

#[async_trait]
impl GenericObserver for IncidentResolution {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        if ctx.operation == Operation::Create {
            ctx.set("reported_by", Value::String(ctx.actor.user_id.to_string()));
        }

        if !ctx.has_input("status") {
            return Ok(());
        }
        let resolved = ctx
            .str_value("status")
            .is_some_and(|s| RESOLVED_STATUSES.contains(&s));

        if resolved {
            ctx.set_default("resolved_at", now_timestamp());
        } else if ctx.previous("resolved_at").is_some() {
            ctx.set("resolved_at", Value::Null);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entity::INCIDENTS;
    use crate::testing::observer_context;
    use serde_json::json;

    #[tokio::test]
    async fn reporter_is_the_actor() {
        let mut ctx = observer_context(&INCIDENTS, Operation::Create, json!({ "title": "Needlestick" }), None);
        IncidentResolution.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.input["reported_by"], json!(ctx.actor.user_id.to_string()));
    }

    #[tokio::test]
    async fn closing_keeps_the_original_resolution_time() {
        let existing = json!({ "status": "resolved", "resolved_at": "2024-06-01T10:00:00+00:00" });
        let mut ctx = observer_context(&INCIDENTS, Operation::Update, json!({ "status": "closed" }), Some(existing));
        IncidentResolution.execute(&mut ctx).await.unwrap();
        assert!(!ctx.has_input("resolved_at"));

        let existing = json!({ "status": "investigating" });
        let mut ctx = observer_context(&INCIDENTS, Operation::Update, json!({ "status": "resolved" }), Some(existing));
        IncidentResolution.execute(&mut ctx).await.unwrap();
        assert!(ctx.input["resolved_at"].is_string());
    }

    #[tokio::test]
    async fn reopening_clears_resolution() {
        let existing = json!({ "status": "resolved", "resolved_at": "2024-06-01T10:00:00+00:00" });
        let mut ctx = observer_context(&INCIDENTS, Operation::Update, json!({ "status": "open" }), Some(existing));
        IncidentResolution.execute(&mut ctx).await.unwrap();
        assert!(ctx.input["resolved_at"].is_null());
    }
}
