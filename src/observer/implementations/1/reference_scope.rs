// Ring 1: referenced rows must belong to the writer's practice
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{GenericObserver, Observer, ObserverRing};
use crate::types::Operation;

pub struct ReferenceScope;

/// A foreign key value supplied by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub field: String,
    pub table: &'static str,
    pub id: Uuid,
}

/// Foreign keys in the input. Nulls and malformed ids are left to `column_values`.
pub fn references(ctx: &ObserverContext) -> Vec<Reference> {
    let entity = ctx.entity();
    ctx.input
        .iter()
        .filter_map(|(name, value)| {
            let table = entity.column(name)?.references?;
            let id = value.as_str().and_then(|s| Uuid::parse_str(s).ok())?;
            Some(Reference { field: name.clone(), table, id })
        })
        .collect()
}

pub async fn exists_in_practice(
    pool: &PgPool,
    table: &'static str,
    id: Uuid,
    practice_id: Uuid,
) -> Result<bool, DatabaseError> {
    let query = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1 AND practice_id = $2 AND deleted_at IS NULL)",
        table
    );
    let (found,): (bool,) = sqlx::query_as(&query)
        .bind(id)
        .bind(practice_id)
        .fetch_one(pool)
        .await?;
    Ok(found)
}

impl Observer for ReferenceScope {
    fn name(&self) -> &'static str {
        "reference_scope"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Validation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn priority(&self) -> u8 {
        40
    }
}

#[async_trait]
impl GenericObserver for ReferenceScope {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let practice_id = ctx.practice_id();
        for reference in references(ctx) {
            if !exists_in_practice(ctx.repository.pool(), reference.table, reference.id, practice_id).await? {
                return Err(ObserverError::validation(
                    reference.field,
                    format!("{} does not exist in this practice", reference.id),
                ));
            }
        }
        Ok(())
    }
}
