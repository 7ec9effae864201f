// Ring 6: alert managers about an out-of-range fridge reading
use async_trait::async_trait;
use serde_json::Value;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{GenericObserver, Observer, ObserverRing};
use crate::services::notification_service::{NewNotification, NotificationService, KIND_ALERT, PRIORITY_HIGH};
use crate::types::{Operation, Role};

pub struct FridgeAlert;

impl Observer for FridgeAlert {
    fn name(&self) -> &'static str {
        "fridge_alert"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::PostDatabase
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Create
    }

    fn tables(&self) -> &'static [&'static str] {
        &["fridge_temperature_logs"]
    }
}

#[async_trait]
impl GenericObserver for FridgeAlert {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let out_of_range = ctx
            .result
            .as_ref()
            .and_then(|r| r.get("out_of_range"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !out_of_range {
            return Ok(());
        }

        let fridge_name = ctx.metadata.get("fridge_name").and_then(Value::as_str).unwrap_or("Fridge");
        let range = match (
            ctx.metadata.get("fridge_min_temp").and_then(Value::as_str),
            ctx.metadata.get("fridge_max_temp").and_then(Value::as_str),
        ) {
            (Some(min), Some(max)) => format!(" (safe range {}°C to {}°C)", min, max),
            _ => String::new(),
        };
        let reading = ctx
            .result
            .as_ref()
            .and_then(|r| r.get("current_temp"))
            .map(|v| v.to_string())
            .unwrap_or_default();

        let notification = NewNotification::new(
            format!("{} temperature out of range", fridge_name),
            format!("A reading of {}°C was recorded{}. Check the cold chain and record the action taken.", reading, range),
        )
        .kind(KIND_ALERT)
        .priority(PRIORITY_HIGH)
        .link("/fridges");

        let notified = NotificationService::new(ctx.repository.pool().clone())
            .notify_role(ctx.practice_id(), Role::Manager, &notification)
            .await?;
        tracing::info!("Fridge alert for '{}' sent to {} users", fridge_name, notified.len());
        Ok(())
    }
}
