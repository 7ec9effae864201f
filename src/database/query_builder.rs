use serde_json::Value;
use sqlx::{self, postgres::PgArguments, FromRow, PgPool, Row};
use uuid::Uuid;

use crate::database::entity::EntityDef;
use crate::database::manager::DatabaseError;
use crate::filter::{Filter, FilterData, SqlResult};

/// One row from a `to_jsonb(t) AS record` projection
#[derive(Debug, FromRow)]
pub struct JsonRecord {
    pub record: Value,
}

/// Runs filter-generated reads against one entity
pub struct QueryBuilder {
    filter: Filter,
}

impl QueryBuilder {
    pub fn new(entity: &'static EntityDef) -> Self {
        Self { filter: Filter::new(entity) }
    }

    pub fn scoped(mut self, practice_id: Uuid) -> Self {
        self.filter.scoped(practice_id);
        self
    }

    pub fn filter(mut self, filter_data: FilterData) -> Result<Self, DatabaseError> {
        self.filter.assign(filter_data)?;
        Ok(self)
    }

    pub async fn select_all(self, pool: &PgPool) -> Result<Vec<Value>, DatabaseError> {
        let sql_result = self.filter.to_sql()?;
        let rows = bind_params_as::<JsonRecord>(&sql_result)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.record).collect())
    }

    pub async fn select_optional(self, pool: &PgPool) -> Result<Option<Value>, DatabaseError> {
        let sql_result = self.filter.to_sql()?;
        let row = bind_params_as::<JsonRecord>(&sql_result)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|r| r.record))
    }

    pub async fn count(self, pool: &PgPool) -> Result<i64, DatabaseError> {
        let sql_result = self.filter.to_count_sql()?;
        let row = bind_params(&sql_result).fetch_one(pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count)
    }
}

/// Bind text parameters in order; SQL casts give them their real types
pub fn bind_params(sql: &SqlResult) -> sqlx::query::Query<'_, sqlx::Postgres, PgArguments> {
    sql.params
        .iter()
        .fold(sqlx::query(&sql.query), |q, p| q.bind(p.as_deref()))
}

pub fn bind_params_as<O>(sql: &SqlResult) -> sqlx::query::QueryAs<'_, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    sql.params
        .iter()
        .fold(sqlx::query_as::<_, O>(&sql.query), |q, p| q.bind(p.as_deref()))
}
