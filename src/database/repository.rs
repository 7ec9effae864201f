use serde_json::{json, Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::entity::{ColumnDef, EntityDef, SYSTEM_COLUMNS};
use crate::database::manager::DatabaseError;
use crate::database::query_builder::{bind_params_as, JsonRecord, QueryBuilder};
use crate::filter::{FilterData, SqlResult};

/// JSON CRUD over one registered entity, always scoped to a single practice.
#[derive(Clone)]
pub struct Repository {
    entity: &'static EntityDef,
    practice_id: Uuid,
    pool: PgPool,
}

impl Repository {
    pub fn new(entity: &'static EntityDef, practice_id: Uuid, pool: PgPool) -> Self {
        Self { entity, practice_id, pool }
    }

    pub fn entity(&self) -> &'static EntityDef {
        self.entity
    }

    pub fn practice_id(&self) -> Uuid {
        self.practice_id
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn list(&self, filter_data: FilterData) -> Result<Vec<Value>, DatabaseError> {
        QueryBuilder::new(self.entity)
            .scoped(self.practice_id)
            .filter(filter_data)?
            .select_all(&self.pool)
            .await
    }

    pub async fn count(&self, filter_data: FilterData) -> Result<i64, DatabaseError> {
        QueryBuilder::new(self.entity)
            .scoped(self.practice_id)
            .filter(FilterData { where_clause: filter_data.where_clause, ..Default::default() })?
            .count(&self.pool)
            .await
    }

    pub async fn get_optional(&self, id: Uuid) -> Result<Option<Value>, DatabaseError> {
        QueryBuilder::new(self.entity)
            .scoped(self.practice_id)
            .filter(FilterData {
                where_clause: Some(json!({ "id": id.to_string() })),
                limit: Some(1),
                ..Default::default()
            })?
            .select_optional(&self.pool)
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Value, DatabaseError> {
        self.get_optional(id).await?.ok_or_else(|| self.not_found(id))
    }

    pub async fn create(&self, record: &Map<String, Value>) -> Result<Value, DatabaseError> {
        let mut columns = vec!["\"practice_id\"".to_string()];
        let mut values = vec!["$1::uuid".to_string()];
        let mut params = vec![Some(self.practice_id.to_string())];

        for (name, value) in record {
            // null on create means "use the column default"
            if value.is_null() {
                continue;
            }
            let column = self.storable_column(name)?;
            params.push(Self::bind(column, value)?);
            columns.push(format!("\"{}\"", name));
            values.push(format!("${}{}", params.len(), column.kind.sql_cast()));
        }

        let sql = SqlResult {
            query: format!(
                "INSERT INTO \"{}\" AS t ({}) VALUES ({}) RETURNING to_jsonb(t) AS record",
                self.entity.table,
                columns.join(", "),
                values.join(", ")
            ),
            params,
        };
        let row = bind_params_as::<JsonRecord>(&sql).fetch_one(&self.pool).await?;
        Ok(row.record)
    }

    pub async fn update(&self, id: Uuid, changes: &Map<String, Value>) -> Result<Value, DatabaseError> {
        if changes.is_empty() {
            return self.get(id).await;
        }

        let mut params = vec![Some(id.to_string()), Some(self.practice_id.to_string())];
        let mut assignments = Vec::with_capacity(changes.len() + 1);
        for (name, value) in changes {
            let column = self.storable_column(name)?;
            params.push(Self::bind(column, value)?);
            assignments.push(format!("\"{}\" = ${}{}", name, params.len(), column.kind.sql_cast()));
        }
        assignments.push("\"updated_at\" = now()".to_string());

        let sql = SqlResult {
            query: format!(
                "UPDATE \"{}\" AS t SET {} WHERE {} RETURNING to_jsonb(t) AS record",
                self.entity.table,
                assignments.join(", "),
                self.identity_clause()
            ),
            params,
        };
        bind_params_as::<JsonRecord>(&sql)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.record)
            .ok_or_else(|| self.not_found(id))
    }

    /// Soft delete when the table supports it, otherwise remove the row
    pub async fn delete(&self, id: Uuid) -> Result<Value, DatabaseError> {
        let query = if self.entity.soft_delete {
            format!(
                "UPDATE \"{}\" AS t SET \"deleted_at\" = now(), \"updated_at\" = now() WHERE {} RETURNING to_jsonb(t) AS record",
                self.entity.table,
                self.identity_clause()
            )
        } else {
            format!(
                "DELETE FROM \"{}\" AS t WHERE {} RETURNING to_jsonb(t) AS record",
                self.entity.table,
                self.identity_clause()
            )
        };
        let sql = SqlResult { query, params: vec![Some(id.to_string()), Some(self.practice_id.to_string())] };
        bind_params_as::<JsonRecord>(&sql)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.record)
            .ok_or_else(|| self.not_found(id))
    }

    fn identity_clause(&self) -> String {
        let mut clause = "\"id\" = $1::uuid AND \"practice_id\" = $2::uuid".to_string();
        if self.entity.soft_delete {
            clause.push_str(" AND \"deleted_at\" IS NULL");
        }
        clause
    }

    /// Any entity column except the system ones. Client-facing writability is
    /// checked earlier in the observer pipeline, since observers may stamp
    /// read-only columns such as `completed_at`.
    fn storable_column(&self, name: &str) -> Result<&'static ColumnDef, DatabaseError> {
        if SYSTEM_COLUMNS.iter().any(|c| c.name == name) || name == "deleted_at" {
            return Err(DatabaseError::validation(name, "system column cannot be set"));
        }
        self.entity
            .columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| DatabaseError::validation(name, "unknown column"))
    }

    fn bind(column: &ColumnDef, value: &Value) -> Result<Option<String>, DatabaseError> {
        column.bind(value).map_err(|message| DatabaseError::validation(column.name, message))
    }

    fn not_found(&self, id: Uuid) -> DatabaseError {
        DatabaseError::NotFound(format!("{} {} not found", self.entity.entity_type, id))
    }
}

/// Reject fields a client may not write directly
pub fn check_client_writable(entity: &EntityDef, record: &Map<String, Value>) -> Result<(), DatabaseError> {
    for name in record.keys() {
        match entity.columns.iter().find(|c| c.name == name) {
            Some(column) if column.writable => {}
            Some(_) => return Err(DatabaseError::validation(name, "field is read-only")),
            None if entity.column(name).is_some() => {
                return Err(DatabaseError::validation(name, "system column cannot be set"))
            }
            None => return Err(DatabaseError::validation(name, "unknown field")),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entity::{AUDIT_LOGS, TASKS};
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn clients_cannot_write_system_or_readonly_columns() {
        assert!(check_client_writable(&TASKS, &map(json!({ "title": "Check defib", "due_date": "2024-05-01" }))).is_ok());

        let err = check_client_writable(&TASKS, &map(json!({ "practice_id": Uuid::new_v4() }))).unwrap_err();
        assert!(matches!(err, DatabaseError::Validation { ref field, .. } if field == "practice_id"));

        let err = check_client_writable(&TASKS, &map(json!({ "completed_at": "2024-05-01T00:00:00Z" }))).unwrap_err();
        assert!(matches!(err, DatabaseError::Validation { ref message, .. } if message.contains("read-only")));

        assert!(check_client_writable(&TASKS, &map(json!({ "colour": "red" }))).is_err());
        assert!(check_client_writable(&AUDIT_LOGS, &map(json!({ "action": "create" }))).is_err());
    }
}
