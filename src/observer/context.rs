use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::database::entity::EntityDef;
use crate::database::repository::Repository;
use crate::observer::error::ObserverWarning;
use crate::observer::traits::ObserverRing;
use crate::types::{Operation, Role};

/// The user on whose behalf a write is made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

/// State flowing through the observer pipeline for a single record write
pub struct ObserverContext {
    pub operation: Operation,
    pub repository: Repository,
    pub actor: Actor,
    pub record_id: Option<Uuid>,

    /// Fields being written. Observers add or overwrite entries here.
    pub input: Map<String, Value>,

    /// Stored row before the write (updates and deletes)
    pub existing: Option<Map<String, Value>>,

    /// Row returned by the database ring
    pub result: Option<Value>,

    /// Values shared between observers of the same write
    pub metadata: Map<String, Value>,

    pub current_ring: Option<ObserverRing>,
    pub warnings: Vec<ObserverWarning>,
}

impl ObserverContext {
    pub fn new(
        operation: Operation,
        repository: Repository,
        actor: Actor,
        record_id: Option<Uuid>,
        input: Map<String, Value>,
    ) -> Self {
        Self {
            operation,
            repository,
            actor,
            record_id,
            input,
            existing: None,
            result: None,
            metadata: Map::new(),
            current_ring: None,
            warnings: Vec::new(),
        }
    }

    pub fn entity(&self) -> &'static EntityDef {
        self.repository.entity()
    }

    pub fn table(&self) -> &'static str {
        self.repository.entity().table
    }

    pub fn practice_id(&self) -> Uuid {
        self.repository.practice_id()
    }

    /// Effective value after the write: input wins over the stored row.
    /// JSON null counts as absent.
    pub fn value(&self, field: &str) -> Option<&Value> {
        match self.input.get(field) {
            Some(v) => Some(v),
            None => self.previous(field),
        }
        .filter(|v| !v.is_null())
    }

    pub fn previous(&self, field: &str) -> Option<&Value> {
        self.existing
            .as_ref()
            .and_then(|e| e.get(field))
            .filter(|v| !v.is_null())
    }

    pub fn str_value(&self, field: &str) -> Option<&str> {
        self.value(field).and_then(Value::as_str)
    }

    pub fn date_value(&self, field: &str) -> Option<NaiveDate> {
        self.str_value(field)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    }

    pub fn has_input(&self, field: &str) -> bool {
        self.input.contains_key(field)
    }

    /// True when this write moves `field` to `value` from something else
    pub fn transitions_to(&self, field: &str, value: &str) -> bool {
        let incoming = self.input.get(field).and_then(Value::as_str);
        let before = self.previous(field).and_then(Value::as_str);
        incoming == Some(value) && before != Some(value)
    }

    /// True when this write moves `field` away from `value`
    pub fn transitions_from(&self, field: &str, value: &str) -> bool {
        let before = self.previous(field).and_then(Value::as_str);
        before == Some(value) && self.has_input(field) && self.str_value(field) != Some(value)
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.input.insert(field.to_string(), value);
    }

    /// Set only when neither the input nor the stored row has a value
    pub fn set_default(&mut self, field: &str, value: Value) {
        if self.value(field).is_none() {
            self.set(field, value);
        }
    }

    pub fn warn(&mut self, observer: &'static str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("Observer {} warning: {}", observer, message);
        self.warnings.push(ObserverWarning { observer, message });
    }

    /// Id of the written row, available after the database ring
    pub fn result_id(&self) -> Option<Uuid> {
        self.result
            .as_ref()
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .or(self.record_id)
    }

    pub fn result_str(&self, field: &str) -> Option<&str> {
        self.result.as_ref().and_then(|r| r.get(field)).and_then(Value::as_str)
    }
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn now_timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339())
}
