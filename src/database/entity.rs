//! Static registry of the practice-owned tables exposed through the generic
//! CRUD endpoints. Each entry carries the column types used to validate
//! incoming JSON, to cast bound parameters, and to reject unknown columns in
//! filters.

use chrono::{DateTime, Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

use crate::types::{Role, TaskFrequency};

/// Years accepted in date columns
pub const DATE_YEARS: std::ops::RangeInclusive<i32> = 1900..=9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Uuid,
    Date,
    Timestamp,
    Integer,
    Numeric,
    Boolean,
    Json,
    TextArray,
}

impl ColumnKind {
    /// SQL cast appended to a bound text parameter
    pub fn sql_cast(&self) -> &'static str {
        match self {
            ColumnKind::Text => "::text",
            ColumnKind::Uuid => "::uuid",
            ColumnKind::Date => "::date",
            ColumnKind::Timestamp => "::timestamptz",
            ColumnKind::Integer => "::integer",
            ColumnKind::Numeric => "::numeric",
            ColumnKind::Boolean => "::boolean",
            ColumnKind::Json => "::jsonb",
            ColumnKind::TextArray => "::text[]",
        }
    }

    /// Cast for a single element compared against an array column
    pub fn element_cast(&self) -> &'static str {
        match self {
            ColumnKind::TextArray => "::text",
            other => other.sql_cast(),
        }
    }

    /// Validate a JSON value and render it as the text form Postgres will cast.
    pub fn to_bind(&self, value: &Value) -> Result<Option<String>, String> {
        if value.is_null() {
            return Ok(None);
        }
        let rendered = match self {
            ColumnKind::Text => match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return Err("expected a string".to_string()),
            },
            ColumnKind::Uuid => {
                let s = value.as_str().ok_or("expected a UUID string")?;
                Uuid::parse_str(s).map_err(|_| format!("invalid UUID: {}", s))?.to_string()
            }
            ColumnKind::Date => {
                let s = value.as_str().ok_or("expected a date string (YYYY-MM-DD)")?;
                let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("invalid date: {}", s))?;
                if !DATE_YEARS.contains(&date.year()) {
                    return Err(format!(
                        "date must be between {} and {}",
                        DATE_YEARS.start(),
                        DATE_YEARS.end()
                    ));
                }
                date.to_string()
            }
            ColumnKind::Timestamp => {
                let s = value.as_str().ok_or("expected an RFC 3339 timestamp")?;
                DateTime::parse_from_rfc3339(s)
                    .map_err(|_| format!("invalid timestamp: {}", s))?
                    .to_rfc3339()
            }
            ColumnKind::Integer => match value {
                Value::Number(n) if n.is_i64() => n.to_string(),
                Value::String(s) if s.parse::<i64>().is_ok() => s.clone(),
                _ => return Err("expected an integer".to_string()),
            },
            ColumnKind::Numeric => {
                let raw = match value {
                    Value::Number(n) => n.to_string(),
                    Value::String(s) => s.clone(),
                    _ => return Err("expected a number".to_string()),
                };
                Decimal::from_str(&raw)
                    .or_else(|_| Decimal::from_scientific(&raw))
                    .map_err(|_| format!("invalid number: {}", raw))?
                    .to_string()
            }
            ColumnKind::Boolean => match value {
                Value::Bool(b) => b.to_string(),
                Value::String(s) if s == "true" || s == "false" => s.clone(),
                _ => return Err("expected a boolean".to_string()),
            },
            ColumnKind::Json => value.to_string(),
            ColumnKind::TextArray => {
                let items = value.as_array().ok_or("expected an array of strings")?;
                let mut quoted = Vec::with_capacity(items.len());
                for item in items {
                    let s = item.as_str().ok_or("expected an array of strings")?;
                    quoted.push(format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")));
                }
                format!("{{{}}}", quoted.join(","))
            }
        };
        Ok(Some(rendered))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub writable: bool,
    pub required: bool,
    pub allowed: &'static [&'static str],
    /// Practice-owned table this column points at
    pub references: Option<&'static str>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind, writable: true, required: false, allowed: &[], references: None }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Text)
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn readonly(mut self) -> Self {
        self.writable = false;
        self
    }

    pub const fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.allowed = allowed;
        self
    }

    pub const fn references(mut self, table: &'static str) -> Self {
        self.references = Some(table);
        self
    }

    /// Validate and render a client-supplied value for this column
    pub fn bind(&self, value: &Value) -> Result<Option<String>, String> {
        let rendered = self.kind.to_bind(value)?;
        if let Some(ref v) = rendered {
            if !self.allowed.is_empty() && !self.allowed.contains(&v.as_str()) {
                return Err(format!("must be one of: {}", self.allowed.join(", ")));
            }
        }
        Ok(rendered)
    }
}

/// Columns every table carries; clients may filter on them but never write them
pub const SYSTEM_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", ColumnKind::Uuid).readonly(),
    ColumnDef::new("practice_id", ColumnKind::Uuid).readonly(),
    ColumnDef::new("created_at", ColumnKind::Timestamp).readonly(),
    ColumnDef::new("updated_at", ColumnKind::Timestamp).readonly(),
];

const DELETED_AT: ColumnDef = ColumnDef::new("deleted_at", ColumnKind::Timestamp).readonly();

#[derive(Debug)]
pub struct EntityDef {
    pub table: &'static str,
    /// URL segment under /api
    pub path: &'static str,
    /// Singular name recorded in audit logs
    pub entity_type: &'static str,
    pub columns: &'static [ColumnDef],
    pub soft_delete: bool,
    pub read_only: bool,
    pub read_role: Role,
    pub write_role: Role,
    pub delete_role: Role,
}

impl EntityDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns
            .iter()
            .chain(SYSTEM_COLUMNS.iter())
            .find(|c| c.name == name)
            .or_else(|| (self.soft_delete && name == DELETED_AT.name).then_some(&DELETED_AT))
    }

    pub fn required_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.required)
    }

    pub fn by_path(path: &str) -> Option<&'static EntityDef> {
        ENTITIES.iter().copied().find(|e| e.path == path)
    }

    pub fn by_table(table: &str) -> Option<&'static EntityDef> {
        ENTITIES.iter().copied().find(|e| e.table == table)
    }
}

pub const TASK_STATUSES: &[&str] = &["pending", "in_progress", "completed", "cancelled"];
pub const INCIDENT_SEVERITIES: &[&str] = &["low", "medium", "high", "critical"];
pub const INCIDENT_STATUSES: &[&str] = &["open", "investigating", "resolved", "closed"];
pub const COMPLAINT_STATUSES: &[&str] = &["open", "acknowledged", "investigating", "responded", "closed"];
pub const POLICY_STATUSES: &[&str] = &["draft", "pending_approval", "approved", "archived"];
pub const MEDICAL_REQUEST_TYPES: &[&str] = &["sar", "insurance", "medical_report", "other"];
pub const MEDICAL_REQUEST_STATUSES: &[&str] = &["received", "in_progress", "completed", "cancelled"];

use ColumnKind::*;

pub static EMPLOYEES: EntityDef = EntityDef {
    table: "employees",
    path: "employees",
    entity_type: "employee",
    columns: &[
        ColumnDef::new("user_id", Uuid).references("users"),
        ColumnDef::text("name").required(),
        ColumnDef::text("job_title"),
        ColumnDef::text("email"),
        ColumnDef::new("start_date", Date),
        ColumnDef::new("is_active", Boolean),
    ],
    soft_delete: true,
    read_only: false,
    read_role: Role::Staff,
    write_role: Role::Manager,
    delete_role: Role::Manager,
};

pub static TASKS: EntityDef = EntityDef {
    table: "tasks",
    path: "tasks",
    entity_type: "task",
    columns: &[
        ColumnDef::text("title").required(),
        ColumnDef::text("description"),
        ColumnDef::text("category"),
        ColumnDef::new("assigned_to", Uuid).references("employees"),
        ColumnDef::new("due_date", Date).required(),
        ColumnDef::text("frequency").one_of(TaskFrequency::ALL),
        ColumnDef::text("status").one_of(TASK_STATUSES),
        ColumnDef::new("steps", Json),
        ColumnDef::new("tags", TextArray),
        ColumnDef::text("evidence_notes"),
        ColumnDef::new("completed_at", Timestamp).readonly(),
        ColumnDef::new("completed_by", Uuid).readonly(),
        ColumnDef::new("parent_task_id", Uuid).readonly(),
    ],
    soft_delete: true,
    read_only: false,
    read_role: Role::Staff,
    write_role: Role::Staff,
    delete_role: Role::Manager,
};

pub static INCIDENTS: EntityDef = EntityDef {
    table: "incidents",
    path: "incidents",
    entity_type: "incident",
    columns: &[
        ColumnDef::text("title").required(),
        ColumnDef::text("description"),
        ColumnDef::text("category"),
        ColumnDef::text("severity").one_of(INCIDENT_SEVERITIES),
        ColumnDef::text("status").one_of(INCIDENT_STATUSES),
        ColumnDef::new("occurred_at", Timestamp),
        ColumnDef::new("reported_by", Uuid).readonly(),
        ColumnDef::text("actions_taken"),
        ColumnDef::text("lessons_learned"),
        ColumnDef::new("resolved_at", Timestamp).readonly(),
    ],
    soft_delete: true,
    read_only: false,
    read_role: Role::Staff,
    write_role: Role::Staff,
    delete_role: Role::Manager,
};

pub static COMPLAINTS: EntityDef = EntityDef {
    table: "complaints",
    path: "complaints",
    entity_type: "complaint",
    columns: &[
        ColumnDef::text("complainant_name").required(),
        ColumnDef::text("description").required(),
        ColumnDef::text("channel"),
        ColumnDef::new("received_on", Date),
        ColumnDef::new("acknowledgement_due", Date),
        ColumnDef::new("acknowledged_on", Date),
        ColumnDef::new("response_due", Date),
        ColumnDef::new("responded_on", Date),
        ColumnDef::text("status").one_of(COMPLAINT_STATUSES),
        ColumnDef::text("outcome"),
    ],
    soft_delete: true,
    read_only: false,
    read_role: Role::Staff,
    write_role: Role::Staff,
    delete_role: Role::Manager,
};

pub static POLICIES: EntityDef = EntityDef {
    table: "policies",
    path: "policies",
    entity_type: "policy",
    columns: &[
        ColumnDef::text("title").required(),
        ColumnDef::text("category"),
        ColumnDef::text("version"),
        ColumnDef::text("content"),
        ColumnDef::text("document_url"),
        ColumnDef::new("owner_id", Uuid).references("users"),
        ColumnDef::text("status").one_of(POLICY_STATUSES),
        ColumnDef::new("approved_by", Uuid).readonly(),
        ColumnDef::new("approved_at", Timestamp).readonly(),
        ColumnDef::new("review_date", Date),
        ColumnDef::new("last_reviewed_on", Date),
    ],
    soft_delete: true,
    read_only: false,
    read_role: Role::Staff,
    write_role: Role::Manager,
    delete_role: Role::Admin,
};

pub static TRAINING_RECORDS: EntityDef = EntityDef {
    table: "training_records",
    path: "training-records",
    entity_type: "training_record",
    columns: &[
        ColumnDef::new("employee_id", Uuid).required().references("employees"),
        ColumnDef::text("course_name").required(),
        ColumnDef::text("provider"),
        ColumnDef::new("completed_on", Date).required(),
        ColumnDef::new("expires_on", Date),
        ColumnDef::text("certificate_url"),
    ],
    soft_delete: true,
    read_only: false,
    read_role: Role::Staff,
    write_role: Role::Staff,
    delete_role: Role::Manager,
};

pub static FRIDGES: EntityDef = EntityDef {
    table: "fridges",
    path: "fridges",
    entity_type: "fridge",
    columns: &[
        ColumnDef::text("name").required(),
        ColumnDef::text("location"),
        ColumnDef::new("min_temp", Numeric),
        ColumnDef::new("max_temp", Numeric),
        ColumnDef::new("is_active", Boolean),
    ],
    soft_delete: true,
    read_only: false,
    read_role: Role::Staff,
    write_role: Role::Manager,
    delete_role: Role::Admin,
};

pub static FRIDGE_LOGS: EntityDef = EntityDef {
    table: "fridge_temperature_logs",
    path: "fridge-logs",
    entity_type: "fridge_temperature_log",
    columns: &[
        ColumnDef::new("fridge_id", Uuid).required().references("fridges"),
        ColumnDef::new("recorded_at", Timestamp),
        ColumnDef::new("current_temp", Numeric).required(),
        ColumnDef::new("min_temp_recorded", Numeric),
        ColumnDef::new("max_temp_recorded", Numeric),
        ColumnDef::new("out_of_range", Boolean).readonly(),
        ColumnDef::text("action_taken"),
        ColumnDef::new("recorded_by", Uuid).readonly(),
    ],
    soft_delete: false,
    read_only: false,
    read_role: Role::Staff,
    write_role: Role::Staff,
    delete_role: Role::Manager,
};

pub static MEDICAL_REQUESTS: EntityDef = EntityDef {
    table: "medical_requests",
    path: "medical-requests",
    entity_type: "medical_request",
    columns: &[
        ColumnDef::text("request_type").required().one_of(MEDICAL_REQUEST_TYPES),
        ColumnDef::text("requester_name").required(),
        ColumnDef::text("patient_reference"),
        ColumnDef::new("received_on", Date),
        ColumnDef::new("due_on", Date),
        ColumnDef::new("completed_on", Date),
        ColumnDef::text("status").one_of(MEDICAL_REQUEST_STATUSES),
        ColumnDef::text("notes"),
    ],
    soft_delete: true,
    read_only: false,
    read_role: Role::Staff,
    write_role: Role::Staff,
    delete_role: Role::Manager,
};

pub static AUDIT_LOGS: EntityDef = EntityDef {
    table: "audit_logs",
    path: "audit-logs",
    entity_type: "audit_log",
    columns: &[
        ColumnDef::new("user_id", Uuid).readonly(),
        ColumnDef::text("action").readonly(),
        ColumnDef::text("entity_type").readonly(),
        ColumnDef::new("entity_id", Uuid).readonly(),
        ColumnDef::text("method").readonly(),
        ColumnDef::text("path").readonly(),
        ColumnDef::new("status_code", Integer).readonly(),
        ColumnDef::new("details", Json).readonly(),
        ColumnDef::text("ip_address").readonly(),
    ],
    soft_delete: false,
    read_only: true,
    read_role: Role::Manager,
    write_role: Role::Master,
    delete_role: Role::Master,
};

pub static COMPLIANCE_BASELINES: EntityDef = EntityDef {
    table: "compliance_baselines",
    path: "compliance-baselines",
    entity_type: "compliance_baseline",
    columns: &[
        ColumnDef::text("name").readonly(),
        ColumnDef::new("period_start", Date).readonly(),
        ColumnDef::new("period_end", Date).readonly(),
        ColumnDef::new("scores", Json).readonly(),
        ColumnDef::text("scores_checksum").readonly(),
        ColumnDef::new("created_by", Uuid).readonly(),
    ],
    soft_delete: false,
    read_only: true,
    read_role: Role::Staff,
    write_role: Role::Manager,
    delete_role: Role::Admin,
};

pub static AI_SUGGESTIONS: EntityDef = EntityDef {
    table: "ai_suggestions",
    path: "ai-suggestions",
    entity_type: "ai_suggestion",
    columns: &[
        ColumnDef::text("entity_type").readonly(),
        ColumnDef::new("entity_id", Uuid).readonly(),
        ColumnDef::text("content").readonly(),
        ColumnDef::text("model").readonly(),
        ColumnDef::new("created_by", Uuid).readonly(),
    ],
    soft_delete: false,
    read_only: true,
    read_role: Role::Staff,
    write_role: Role::Manager,
    delete_role: Role::Manager,
};

pub static ENTITIES: &[&EntityDef] = &[
    &EMPLOYEES,
    &TASKS,
    &INCIDENTS,
    &COMPLAINTS,
    &POLICIES,
    &TRAINING_RECORDS,
    &FRIDGES,
    &FRIDGE_LOGS,
    &MEDICAL_REQUESTS,
    &AUDIT_LOGS,
    &COMPLIANCE_BASELINES,
    &AI_SUGGESTIONS,
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookups_by_path_and_table() {
        assert_eq!(EntityDef::by_path("training-records").unwrap().table, "training_records");
        assert_eq!(EntityDef::by_table("fridge_temperature_logs").unwrap().path, "fridge-logs");
        assert!(EntityDef::by_path("users").is_none());
    }

    #[test]
    fn system_and_soft_delete_columns_resolve() {
        assert!(TASKS.column("id").is_some());
        assert!(TASKS.column("deleted_at").is_some());
        assert!(FRIDGE_LOGS.column("deleted_at").is_none());
        assert!(TASKS.column("password_hash").is_none());
    }

    #[test]
    fn kinds_validate_values() {
        assert_eq!(Date.to_bind(&json!("2024-03-01")).unwrap(), Some("2024-03-01".into()));
        assert!(Date.to_bind(&json!("01/03/2024")).is_err());
        assert!(Date.to_bind(&json!("+262142-12-20")).is_err());
        assert!(Date.to_bind(&json!("1899-12-31")).is_err());
        assert!(Date.to_bind(&json!("9999-12-31")).is_ok());
        assert!(Uuid.to_bind(&json!("not-a-uuid")).is_err());
        assert_eq!(Numeric.to_bind(&json!(8.5)).unwrap(), Some("8.5".into()));
        assert_eq!(Boolean.to_bind(&json!(true)).unwrap(), Some("true".into()));
        assert_eq!(Text.to_bind(&Value::Null).unwrap(), None);
        assert!(Integer.to_bind(&json!(1.5)).is_err());
    }

    #[test]
    fn text_arrays_render_as_array_literals() {
        let rendered = TextArray.to_bind(&json!(["infection control", "say \"hi\""])).unwrap();
        assert_eq!(rendered.unwrap(), r#"{"infection control","say \"hi\""}"#);
    }

    #[test]
    fn enum_columns_reject_unknown_values() {
        let severity = INCIDENTS.column("severity").unwrap();
        assert!(severity.bind(&json!("critical")).is_ok());
        assert!(severity.bind(&json!("catastrophic")).is_err());
    }

    #[test]
    fn every_entity_has_unique_path() {
        for (i, a) in ENTITIES.iter().enumerate() {
            for b in &ENTITIES[i + 1..] {
                assert_ne!(a.path, b.path);
                assert_ne!(a.table, b.table);
            }
        }
    }
}
