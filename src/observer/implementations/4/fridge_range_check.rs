// Ring 4: compare a temperature reading with its fridge's safe range
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

use crate::database::models::Fridge;
use crate::observer::context::{now_timestamp, ObserverContext};
use crate::observer::error::ObserverError;
use crate::observer::traits::{GenericObserver, Observer, ObserverRing};
use crate::services::fridge_service::FridgeService;
use crate::types::Operation;

const READINGS: [&str; 3] = ["current_temp", "min_temp_recorded", "max_temp_recorded"];

/// True when any supplied reading falls outside the fridge's range
pub fn readings_out_of_range(fridge: &Fridge, readings: &[Decimal]) -> bool {
    readings.iter().any(|r| !fridge.in_range(*r))
}

fn parse_reading(field: &str, value: &Value) -> Result<Decimal, ObserverError> {
    let parsed = match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ObserverError::validation(field, "must be a number"))
}

pub struct FridgeRangeCheck;

impl Observer for FridgeRangeCheck {
    fn name(&self) -> &'static str {
        "fridge_range_check"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn tables(&self) -> &'static [&'static str] {
        &["fridge_temperature_logs"]
    }
}

#[async_trait]
impl GenericObserver for FridgeRangeCheck {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let creating = ctx.operation == Operation::Create;
        if creating {
            ctx.set("recorded_by", Value::String(ctx.actor.user_id.to_string()));
            ctx.set_default("recorded_at", now_timestamp());
        }

        let touches_reading = creating || ctx.has_input("fridge_id") || READINGS.iter().any(|f| ctx.has_input(f));
        if !touches_reading {
            return Ok(());
        }

        let fridge_id = ctx
            .str_value("fridge_id")
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| ObserverError::validation("fridge_id", "must reference a fridge"))?;

        let fridge = FridgeService::new(ctx.repository.pool().clone())
            .find(ctx.practice_id(), fridge_id)
            .await?
            .ok_or_else(|| ObserverError::validation("fridge_id", "fridge not found"))?;

        let mut readings = Vec::with_capacity(READINGS.len());
        for field in READINGS {
            if let Some(value) = ctx.value(field) {
                readings.push(parse_reading(field, value)?);
            }
        }

        let out_of_range = readings_out_of_range(&fridge, &readings);
        ctx.set("out_of_range", Value::Bool(out_of_range));
        ctx.metadata.insert("fridge_name".into(), Value::String(fridge.name.clone()));
        ctx.metadata.insert("fridge_min_temp".into(), Value::String(fridge.min_temp.to_string()));
        ctx.metadata.insert("fridge_max_temp".into(), Value::String(fridge.max_temp.to_string()));
        Ok(())
    }
}
