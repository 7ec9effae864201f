//! Test helpers shared by unit tests across the crate

use serde_json::{Map, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Mutex;
use uuid::Uuid;

use crate::database::entity::EntityDef;
use crate::database::repository::Repository;
use crate::jobs::ai::{AiClient, AiError, ChatMessage};
use crate::jobs::mailer::{MailError, Mailer, OutgoingEmail};
use crate::observer::{Actor, ObserverContext};
use crate::types::{Operation, Role};

/// A pool that never connects unless a query is actually run.
/// Must be created inside a tokio runtime.
pub fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(1))
        .connect_lazy("postgres://localhost/gp_compliance_test")
        .expect("static test url is valid")
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => panic!("expected a JSON object, got {}", other),
    }
}

/// Observer context acting as a practice admin
pub fn observer_context(
    entity: &'static EntityDef,
    operation: Operation,
    input: Value,
    existing: Option<Value>,
) -> ObserverContext {
    observer_context_as(Role::Admin, entity, operation, input, existing)
}

pub fn observer_context_as(
    role: Role,
    entity: &'static EntityDef,
    operation: Operation,
    input: Value,
    existing: Option<Value>,
) -> ObserverContext {
    let repository = Repository::new(entity, Uuid::new_v4(), lazy_pool());
    let actor = Actor { user_id: Uuid::new_v4(), role };
    let record_id = match operation {
        Operation::Create => None,
        _ => Some(Uuid::new_v4()),
    };
    let mut ctx = ObserverContext::new(operation, repository, actor, record_id, object(input));
    ctx.existing = existing.map(object);
    ctx
}

/// Mailer that records every message instead of sending it
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    pub fail_for: Option<String>,
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        if self.fail_for.as_deref() == Some(email.to.as_str()) {
            return Err(MailError::Rejected(format!("mailbox {} unavailable", email.to)));
        }
        self.sent.lock().expect("mailer lock").push(email.clone());
        Ok(())
    }
}

/// AI client returning a canned reply and keeping the prompts it was sent
pub struct CannedAi {
    pub reply: String,
    pub prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl CannedAi {
    pub fn new(reply: &str) -> Self {
        Self { reply: reply.to_string(), prompts: Mutex::new(Vec::new()) }
    }
}

#[async_trait::async_trait]
impl AiClient for CannedAi {
    fn model(&self) -> &str {
        "canned"
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, AiError> {
        self.prompts.lock().expect("prompt lock").push(messages);
        Ok(self.reply.clone())
    }
}
