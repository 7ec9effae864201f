// Ring 4: record who approved a policy
use async_trait::async_trait;
use serde_json::Value;

use crate::observer::context::{now_timestamp, today, ObserverContext};
use crate::observer::error::ObserverError;
use crate::observer::traits::{GenericObserver, Observer, ObserverRing};
use crate::types::Operation;

pub struct PolicyApprovalStamp;

impl Observer for PolicyApprovalStamp {
    fn name(&self) -> &'static str {
        "policy_approval_stamp"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn tables(&self) -> &'static [&'static str] {
        &["policies"]
    }
}

#[async_trait]
impl GenericObserver for PolicyApprovalStamp {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        if ctx.transitions_to("status", "approved") {
            ctx.set("approved_by", Value::String(ctx.actor.user_id.to_string()));
            ctx.set("approved_at", now_timestamp());
            if !ctx.has_input("last_reviewed_on") {
                ctx.set("last_reviewed_on", Value::String(today().to_string()));
            }
        } else if ctx.transitions_to("status", "pending_approval") && ctx.previous("approved_at").is_some() {
            // resubmitted after a revision
            ctx.set("approved_by", Value::Null);
            ctx.set("approved_at", Value::Null);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entity::POLICIES;
    use crate::testing::observer_context;
    use serde_json::json;

    #[tokio::test]
    async fn approval_is_stamped() {
        let mut ctx = observer_context(
            &POLICIES,
            Operation::Update,
            json!({ "status": "approved" }),
            Some(json!({ "title": "Chaperone policy", "status": "pending_approval" })),
        );
        PolicyApprovalStamp.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.input["approved_by"], json!(ctx.actor.user_id.to_string()));
        assert!(ctx.input["approved_at"].is_string());
        assert_eq!(ctx.input["last_reviewed_on"], json!(today().to_string()));
    }

    #[tokio::test]
    async fn resubmission_clears_the_previous_approval() {
        let mut ctx = observer_context(
            &POLICIES,
            Operation::Update,
            json!({ "status": "pending_approval", "version": "2.0" }),
            Some(json!({ "status": "approved", "approved_at": "2024-01-10T12:00:00+00:00" })),
        );
        PolicyApprovalStamp.execute(&mut ctx).await.unwrap();
        assert!(ctx.input["approved_at"].is_null());
        assert!(ctx.input["approved_by"].is_null());
    }
}
