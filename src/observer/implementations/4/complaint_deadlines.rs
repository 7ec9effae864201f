// Ring 4: complaint acknowledgement and response deadlines
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use serde_json::Value;

use crate::observer::context::{today, ObserverContext};
use crate::observer::error::ObserverError;
use crate::observer::traits::{GenericObserver, Observer, ObserverRing};
use crate::types::{add_working_days, Operation};

pub const ACKNOWLEDGEMENT_WORKING_DAYS: u32 = 3;
pub const RESPONSE_DAYS: u64 = 28;

pub fn acknowledgement_due(received_on: NaiveDate) -> Option<NaiveDate> {
    add_working_days(received_on, ACKNOWLEDGEMENT_WORKING_DAYS)
}

pub fn response_due(received_on: NaiveDate) -> Option<NaiveDate> {
    received_on.checked_add_days(Days::new(RESPONSE_DAYS))
}

fn date(d: NaiveDate) -> Value {
    Value::String(d.to_string())
}

pub struct ComplaintDeadlines;

impl Observer for ComplaintDeadlines {
    fn name(&self) -> &'static str {
        "complaint_deadlines"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn tables(&self) -> &'static [&'static str] {
        &["complaints"]
    }
}

#[async_trait]
impl GenericObserver for ComplaintDeadlines {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let creating = ctx.operation == Operation::Create;
        if creating {
            ctx.set_default("received_on", date(today()));
        }

        if creating || ctx.has_input("received_on") {
            if let Some(received_on) = ctx.date_value("received_on") {
                let out_of_range = || ObserverError::validation("received_on", "date is out of range");
                if !ctx.has_input("acknowledgement_due") {
                    let due = acknowledgement_due(received_on).ok_or_else(out_of_range)?;
                    ctx.set("acknowledgement_due", date(due));
                }
                if !ctx.has_input("response_due") {
                    let due = response_due(received_on).ok_or_else(out_of_range)?;
                    ctx.set("response_due", date(due));
                }
            }
        }

        if ctx.transitions_to("status", "acknowledged") {
            ctx.set_default("acknowledged_on", date(today()));
        }
        if ctx.transitions_to("status", "responded") {
            ctx.set_default("responded_on", date(today()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entity::COMPLAINTS;
    use crate::testing::observer_context;
    use serde_json::json;

    #[test]
    fn acknowledgement_skips_weekends() {
        // Thursday 6 June 2024
        let received = NaiveDate::from_ymd_opt(2024, 6, 6).unwrap();
        assert_eq!(acknowledgement_due(received).unwrap().to_string(), "2024-06-11");
        assert_eq!(response_due(received).unwrap().to_string(), "2024-07-04");
    }

    #[tokio::test]
    async fn far_future_received_dates_are_rejected() {
        let mut ctx = observer_context(
            &COMPLAINTS,
            Operation::Update,
            json!({ "received_on": "+262142-12-20" }),
            Some(json!({ "status": "open" })),
        );
        let err = ComplaintDeadlines.execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, ObserverError::ValidationError { ref field, .. } if field == "received_on"));
    }

    #[tokio::test]
    async fn deadlines_default_from_received_on() {
        let mut ctx = observer_context(
            &COMPLAINTS,
            Operation::Create,
            json!({ "complainant_name": "A Patient", "description": "Wait times", "received_on": "2024-06-06" }),
            None,
        );
        ComplaintDeadlines.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.input["acknowledgement_due"], "2024-06-11");
        assert_eq!(ctx.input["response_due"], "2024-07-04");
    }

    #[tokio::test]
    async fn explicit_deadlines_are_kept() {
        let mut ctx = observer_context(
            &COMPLAINTS,
            Operation::Create,
            json!({ "received_on": "2024-06-06", "response_due": "2024-06-20" }),
            None,
        );
        ComplaintDeadlines.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.input["response_due"], "2024-06-20");
    }

    #[tokio::test]
    async fn acknowledging_stamps_the_date() {
        let mut ctx = observer_context(
            &COMPLAINTS,
            Operation::Update,
            json!({ "status": "acknowledged" }),
            Some(json!({ "status": "open", "received_on": "2024-06-06" })),
        );
        ComplaintDeadlines.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.input["acknowledged_on"], json!(today().to_string()));
        assert!(!ctx.has_input("acknowledgement_due"));
    }
}
