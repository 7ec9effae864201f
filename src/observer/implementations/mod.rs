// Observer implementations organized by rings

use crate::observer::traits::GenericObserver;

// Ring 0: Data Preparation
#[path = "0/record_loader.rs"]
pub mod record_loader;

// Ring 1: Validation
#[path = "1/writable_fields.rs"]
pub mod writable_fields;
#[path = "1/required_fields.rs"]
pub mod required_fields;
#[path = "1/column_values.rs"]
pub mod column_values;
#[path = "1/reference_scope.rs"]
pub mod reference_scope;
#[path = "1/policy_approval_guard.rs"]
pub mod policy_approval_guard;

// Ring 4: Enrichment
#[path = "4/task_completion.rs"]
pub mod task_completion;
#[path = "4/incident_resolution.rs"]
pub mod incident_resolution;
#[path = "4/complaint_deadlines.rs"]
pub mod complaint_deadlines;
#[path = "4/medical_request_due.rs"]
pub mod medical_request_due;
#[path = "4/fridge_range_check.rs"]
pub mod fridge_range_check;
#[path = "4/policy_approval_stamp.rs"]
pub mod policy_approval_stamp;

// Ring 5: Database
#[path = "5/sql_executor.rs"]
pub mod sql_executor;

// Ring 6: Post-Database
#[path = "6/task_recurrence.rs"]
pub mod task_recurrence;
#[path = "6/fridge_alert.rs"]
pub mod fridge_alert;
#[path = "6/policy_notifications.rs"]
pub mod policy_notifications;

pub use complaint_deadlines::ComplaintDeadlines;
pub use fridge_alert::FridgeAlert;
pub use fridge_range_check::FridgeRangeCheck;
pub use incident_resolution::IncidentResolution;
pub use medical_request_due::{target_due_date, MedicalRequestDue};
pub use policy_approval_guard::PolicyApprovalGuard;
pub use policy_approval_stamp::PolicyApprovalStamp;
pub use policy_notifications::PolicyNotifications;
pub use record_loader::RecordLoader;
pub use reference_scope::ReferenceScope;
pub use required_fields::RequiredFields;
pub use column_values::ColumnValues;
pub use sql_executor::SqlExecutor;
pub use task_completion::TaskCompletion;
pub use task_recurrence::TaskRecurrence;
pub use writable_fields::WritableFields;

/// Every built-in observer
pub fn all() -> Vec<Box<dyn GenericObserver>> {
    vec![
        Box::new(RecordLoader),
        Box::new(WritableFields),
        Box::new(RequiredFields),
        Box::new(ColumnValues),
        Box::new(ReferenceScope),
        Box::new(PolicyApprovalGuard),
        Box::new(TaskCompletion),
        Box::new(IncidentResolution),
        Box::new(ComplaintDeadlines),
        Box::new(MedicalRequestDue),
        Box::new(FridgeRangeCheck),
        Box::new(PolicyApprovalStamp),
        Box::new(SqlExecutor),
        Box::new(TaskRecurrence),
        Box::new(FridgeAlert),
        Box::new(PolicyNotifications),
    ]
}
