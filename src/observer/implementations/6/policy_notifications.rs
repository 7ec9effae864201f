// Ring 6: governance notifications for policy approval
use async_trait::async_trait;
use uuid::Uuid;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{GenericObserver, Observer, ObserverRing};
use crate::services::notification_service::{
    NewNotification, NotificationService, KIND_APPROVAL, PRIORITY_HIGH,
};
use crate::types::{Operation, Role};

pub struct PolicyNotifications;

impl Observer for PolicyNotifications {
    fn name(&self) -> &'static str {
        "policy_notifications"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::PostDatabase
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn tables(&self) -> &'static [&'static str] {
        &["policies"]
    }
}

#[async_trait]
impl GenericObserver for PolicyNotifications {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let title = ctx.result_str("title").unwrap_or("Policy").to_string();
        let link = ctx.result_id().map(|id| format!("/policies/{}", id));
        let service = NotificationService::new(ctx.repository.pool().clone());

        if ctx.transitions_to("status", "pending_approval") {
            let mut notification = NewNotification::new(
                "Policy awaiting approval",
                format!("\"{}\" has been submitted for approval.", title),
            )
            .kind(KIND_APPROVAL);
            if let Some(link) = &link {
                notification = notification.link(link.clone());
            }
            service.notify_role(ctx.practice_id(), Role::Admin, &notification).await?;
        } else if ctx.transitions_to("status", "approved") {
            let Some(owner) = ctx.result_str("owner_id").and_then(|s| Uuid::parse_str(s).ok()) else {
                return Ok(());
            };
            let mut notification = NewNotification::new("Policy approved", format!("\"{}\" has been approved.", title))
                .kind(KIND_APPROVAL)
                .priority(PRIORITY_HIGH);
            if let Some(link) = link {
                notification = notification.link(link);
            }
            service.notify_user(ctx.practice_id(), owner, &notification).await?;
        }
        Ok(())
    }
}
