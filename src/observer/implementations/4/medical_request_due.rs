// Ring 4: statutory turnaround targets for medical requests
use async_trait::async_trait;
use chrono::{Days, Months, NaiveDate};
use serde_json::Value;

use crate::observer::context::{today, ObserverContext};
use crate::observer::error::ObserverError;
use crate::observer::traits::{GenericObserver, Observer, ObserverRing};
use crate::types::Operation;

/// Target completion date for a request type. Subject access requests get
/// one calendar month; reports and insurance requests a fixed number of days.
pub fn target_due_date(request_type: &str, received_on: NaiveDate) -> Option<NaiveDate> {
    match request_type {
        "sar" => received_on.checked_add_months(Months::new(1)),
        "insurance" => received_on.checked_add_days(Days::new(20)),
        "medical_report" => received_on.checked_add_days(Days::new(21)),
        "other" => received_on.checked_add_days(Days::new(28)),
        _ => None,
    }
}

pub struct MedicalRequestDue;

impl Observer for MedicalRequestDue {
    fn name(&self) -> &'static str {
        "medical_request_due"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn tables(&self) -> &'static [&'static str] {
        &["medical_requests"]
    }
}

#[async_trait]
impl GenericObserver for MedicalRequestDue {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let creating = ctx.operation == Operation::Create;
        if creating {
            ctx.set_default("received_on", Value::String(today().to_string()));
        }

        let inputs_changed = creating || ctx.has_input("received_on") || ctx.has_input("request_type");
        if inputs_changed && !ctx.has_input("due_on") {
            let due = match (ctx.str_value("request_type"), ctx.date_value("received_on")) {
                (Some(kind), Some(received_on)) => target_due_date(kind, received_on),
                _ => None,
            };
            if let Some(due) = due {
                ctx.set("due_on", Value::String(due.to_string()));
            }
        }

        if ctx.transitions_to("status", "completed") {
            ctx.set_default("completed_on", Value::String(today().to_string()));
        } else if ctx.transitions_from("status", "completed") && !ctx.has_input("completed_on") {
            ctx.set("completed_on", Value::Null);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entity::MEDICAL_REQUESTS;
    use crate::testing::observer_context;
    use serde_json::json;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn targets_by_request_type() {
        assert_eq!(target_due_date("sar", d(2024, 1, 31)), Some(d(2024, 2, 29)));
        assert_eq!(target_due_date("insurance", d(2024, 6, 1)), Some(d(2024, 6, 21)));
        assert_eq!(target_due_date("medical_report", d(2024, 6, 1)), Some(d(2024, 6, 22)));
        assert_eq!(target_due_date("other", d(2024, 6, 1)), Some(d(2024, 6, 29)));
        assert_eq!(target_due_date("fax", d(2024, 6, 1)), None);
        assert_eq!(target_due_date("insurance", NaiveDate::MAX), None);
    }

    #[tokio::test]
    async fn due_on_is_derived_on_create() {
        let mut ctx = observer_context(
            &MEDICAL_REQUESTS,
            Operation::Create,
            json!({ "request_type": "sar", "requester_name": "Solicitor", "received_on": "2024-03-15" }),
            None,
        );
        MedicalRequestDue.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.input["due_on"], "2024-04-15");
    }

    #[tokio::test]
    async fn changing_type_recomputes_due_on() {
        let mut ctx = observer_context(
            &MEDICAL_REQUESTS,
            Operation::Update,
            json!({ "request_type": "insurance" }),
            Some(json!({ "request_type": "sar", "received_on": "2024-03-15", "due_on": "2024-04-15" })),
        );
        MedicalRequestDue.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.input["due_on"], "2024-04-04");
    }

    #[tokio::test]
    async fn completion_stamps_completed_on() {
        let mut ctx = observer_context(
            &MEDICAL_REQUESTS,
            Operation::Update,
            json!({ "status": "completed" }),
            Some(json!({ "status": "in_progress", "request_type": "sar", "received_on": "2024-03-15" })),
        );
        MedicalRequestDue.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.input["completed_on"], json!(today().to_string()));
        assert!(!ctx.has_input("due_on"));
    }
}
