// Ring 1: only admins may approve a policy, and only from pending_approval
use async_trait::async_trait;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{GenericObserver, Observer, ObserverRing};
use crate::types::{Operation, Role};

pub struct PolicyApprovalGuard;

impl Observer for PolicyApprovalGuard {
    fn name(&self) -> &'static str {
        "policy_approval_guard"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Validation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn tables(&self) -> &'static [&'static str] {
        &["policies"]
    }

    fn priority(&self) -> u8 {
        60
    }
}

#[async_trait]
impl GenericObserver for PolicyApprovalGuard {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        if !ctx.transitions_to("status", "approved") {
            return Ok(());
        }
        if !ctx.actor.role.at_least(Role::Admin) {
            return Err(ObserverError::Forbidden("Only admins can approve policies".to_string()));
        }
        if ctx.operation == Operation::Update && ctx.previous("status").and_then(|v| v.as_str()) != Some("pending_approval") {
            return Err(ObserverError::validation(
                "status",
                "policy must be submitted for approval first",
            ));
        }
        Ok(())
    }
}
