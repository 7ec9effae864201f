use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Instant;
use tokio::time::timeout;
use uuid::Uuid;

use crate::database::repository::Repository;
use crate::observer::context::{Actor, ObserverContext};
use crate::observer::error::ObserverError;
use crate::observer::implementations;
use crate::observer::traits::{GenericObserver, ObserverRing};
use crate::types::Operation;

/// Executes registered observers in ring order for a single record write
pub struct ObserverPipeline {
    observers: BTreeMap<ObserverRing, Vec<Box<dyn GenericObserver>>>,
}

/// Pipeline with every built-in observer registered
pub static PIPELINE: Lazy<ObserverPipeline> = Lazy::new(ObserverPipeline::standard);

impl ObserverPipeline {
    pub fn new() -> Self {
        Self { observers: BTreeMap::new() }
    }

    pub fn standard() -> Self {
        let mut pipeline = Self::new();
        for observer in implementations::all() {
            pipeline.register(observer);
        }
        pipeline
    }

    pub fn register(&mut self, observer: Box<dyn GenericObserver>) {
        let ring = observer.ring();
        let name = observer.name();
        let ring_observers = self.observers.entry(ring).or_default();
        ring_observers.push(observer);
        ring_observers.sort_by_key(|o| o.priority());
        tracing::debug!("Registered observer '{}' for ring {:?}", name, ring);
    }

    /// Names of observers that would run for a table and operation, in order
    pub fn plan(&self, table: &str, operation: Operation) -> Vec<&'static str> {
        self.observers
            .values()
            .flatten()
            .filter(|o| o.applies_to_operation(operation) && o.applies_to_table(table))
            .map(|o| o.name())
            .collect()
    }

    pub async fn create(
        &self,
        repository: Repository,
        actor: Actor,
        input: Map<String, Value>,
    ) -> Result<Value, ObserverError> {
        let ctx = ObserverContext::new(Operation::Create, repository, actor, None, input);
        self.execute(ctx).await
    }

    pub async fn update(
        &self,
        repository: Repository,
        actor: Actor,
        id: Uuid,
        input: Map<String, Value>,
    ) -> Result<Value, ObserverError> {
        let ctx = ObserverContext::new(Operation::Update, repository, actor, Some(id), input);
        self.execute(ctx).await
    }

    pub async fn delete(&self, repository: Repository, actor: Actor, id: Uuid) -> Result<Value, ObserverError> {
        let ctx = ObserverContext::new(Operation::Delete, repository, actor, Some(id), Map::new());
        self.execute(ctx).await
    }

    pub async fn execute(&self, mut ctx: ObserverContext) -> Result<Value, ObserverError> {
        let start_time = Instant::now();
        tracing::debug!(
            "Observer pipeline starting: operation={:?}, table={}",
            ctx.operation,
            ctx.table()
        );

        for ring in ObserverRing::ALL {
            ctx.current_ring = Some(ring);
            self.execute_ring(ring, &mut ctx).await?;
        }

        tracing::debug!(
            "Observer pipeline finished: operation={:?}, table={}, warnings={}, elapsed={:?}",
            ctx.operation,
            ctx.table(),
            ctx.warnings.len(),
            start_time.elapsed()
        );

        ctx.result.take().ok_or_else(|| {
            ObserverError::NotFound(format!("{} write produced no record", ctx.entity().entity_type))
        })
    }

    async fn execute_ring(&self, ring: ObserverRing, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let Some(observers) = self.observers.get(&ring) else {
            return Ok(());
        };

        let mut errors = Vec::new();
        for observer in observers {
            if !observer.applies_to_operation(ctx.operation) || !observer.applies_to_table(ctx.table()) {
                continue;
            }

            let outcome = match timeout(observer.timeout(), observer.execute(ctx)).await {
                Ok(result) => result,
                Err(_) => Err(ObserverError::Timeout(observer.name().to_string())),
            };

            match outcome {
                Ok(()) => tracing::trace!("Observer {} completed", observer.name()),
                Err(error) if ring == ObserverRing::PostDatabase => {
                    // The row is already written; report and move on
                    ctx.warn(observer.name(), error.to_string());
                }
                Err(error) if ring.is_pre_database() => {
                    tracing::debug!("Observer {} rejected write: {}", observer.name(), error);
                    errors.push(error);
                }
                Err(error) => return Err(error),
            }
        }

        match Self::merge_errors(errors) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Report every missing field at once; otherwise the first failure wins
    fn merge_errors(errors: Vec<ObserverError>) -> Option<ObserverError> {
        let mut missing: Vec<String> = Vec::new();
        let mut first_other = None;
        for error in errors {
            match error {
                ObserverError::RequiredFields(fields) => missing.extend(fields),
                other if first_other.is_none() => first_other = Some(other),
                _ => {}
            }
        }
        first_other.or_else(|| (!missing.is_empty()).then_some(ObserverError::RequiredFields(missing)))
    }
}

impl Default for ObserverPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_updates_run_completion_then_recurrence() {
        let plan = PIPELINE.plan("tasks", Operation::Update);
        let completion = plan.iter().position(|n| *n == "task_completion").unwrap();
        let sql = plan.iter().position(|n| *n == "sql_executor").unwrap();
        let recurrence = plan.iter().position(|n| *n == "task_recurrence").unwrap();
        assert!(plan[0] == "record_loader");
        assert!(completion < sql && sql < recurrence);
    }

    #[test]
    fn table_specific_observers_stay_on_their_tables() {
        let plan = PIPELINE.plan("employees", Operation::Create);
        assert!(plan.contains(&"required_fields"));
        assert!(!plan.contains(&"fridge_range_check"));
        assert!(!plan.contains(&"record_loader"));
    }

    #[test]
    fn references_are_scoped_after_their_values_parse() {
        let plan = PIPELINE.plan("training_records", Operation::Create);
        let values = plan.iter().position(|n| *n == "column_values").unwrap();
        let scope = plan.iter().position(|n| *n == "reference_scope").unwrap();
        let sql = plan.iter().position(|n| *n == "sql_executor").unwrap();
        assert!(values < scope && scope < sql);
        assert!(!PIPELINE.plan("tasks", Operation::Delete).contains(&"reference_scope"));
    }

    #[test]
    fn deletes_skip_field_validation() {
        let plan = PIPELINE.plan("tasks", Operation::Delete);
        assert!(!plan.contains(&"required_fields"));
        assert!(plan.contains(&"sql_executor"));
    }

    #[test]
    fn missing_fields_are_merged() {
        let merged = ObserverPipeline::merge_errors(vec![
            ObserverError::RequiredFields(vec!["title".into()]),
            ObserverError::RequiredFields(vec!["due_date".into()]),
        ]);
        match merged {
            Some(ObserverError::RequiredFields(fields)) => assert_eq!(fields, vec!["title", "due_date"]),
            other => panic!("unexpected {:?}", other),
        }

        let merged = ObserverPipeline::merge_errors(vec![
            ObserverError::RequiredFields(vec!["title".into()]),
            ObserverError::validation("status", "bad"),
        ]);
        assert!(matches!(merged, Some(ObserverError::ValidationError { .. })));
        assert!(ObserverPipeline::merge_errors(vec![]).is_none());
    }
}
