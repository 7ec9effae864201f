use serde_json::Value;
use uuid::Uuid;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterData, FilterOrderInfo, FilterWhereOptions, SqlResult};
use crate::database::entity::EntityDef;

/// Query over one registered entity. Rows come back as a single `record`
/// JSONB column so the repository never needs per-table structs.
pub struct Filter {
    entity: &'static EntityDef,
    select_columns: Vec<String>,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i32>,
    offset: Option<i32>,
    options: FilterWhereOptions,
}

impl Filter {
    pub fn new(entity: &'static EntityDef) -> Self {
        Self {
            entity,
            select_columns: vec![],
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
            options: FilterWhereOptions {
                soft_delete: entity.soft_delete,
                ..Default::default()
            },
        }
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(select) = data.select {
            self.select(select)?;
        }
        if let Some(where_clause) = data.where_clause {
            self.where_clause(where_clause)?;
        }
        if let Some(order) = data.order {
            self.order(order)?;
        }
        if data.limit.is_some() || data.offset.is_some() {
            let limit = data.limit.unwrap_or(crate::config::config().filter.default_limit);
            self.limit(limit, data.offset)?;
        }
        Ok(self)
    }

    /// Restrict every generated query to one practice
    pub fn scoped(&mut self, practice_id: Uuid) -> &mut Self {
        self.options.practice_scope = Some(practice_id);
        self
    }

    pub fn include_deleted(&mut self, include: bool) -> &mut Self {
        self.options.include_deleted = include;
        self
    }

    pub fn select(&mut self, columns: Vec<String>) -> Result<&mut Self, FilterError> {
        for column in &columns {
            if column != "*" && self.entity.column(column).is_none() {
                return Err(FilterError::InvalidColumn(format!("Unknown column: {}", column)));
            }
        }
        self.select_columns = columns;
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(&order_spec, Some(self.entity))?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i32, offset: Option<i32>) -> Result<&mut Self, FilterError> {
        if limit < 0 {
            return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
        }
        if offset.is_some_and(|off| off < 0) {
            return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
        }

        let config = &crate::config::config().filter;
        let max_limit = config.max_limit.unwrap_or(i32::MAX);
        let applied_limit = if limit > max_limit {
            if config.debug_logging {
                tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max_limit);
            }
            max_limit
        } else {
            limit
        };

        self.limit = Some(applied_limit);
        self.offset = offset;
        Ok(self)
    }

    /// `SELECT <record> FROM "<table>" AS t WHERE ... ORDER BY ... LIMIT ...`
    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let order_clause = FilterOrder::generate(&self.order_data)?;
        let limit_clause = self.build_limit_clause();

        let query = [
            format!("SELECT {} AS record", self.build_select_clause()),
            format!("FROM \"{}\" AS t", self.entity.table),
            format!("WHERE {}", where_result.query),
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        if crate::config::config().filter.debug_logging {
            tracing::debug!(query = %query, params = where_result.params.len(), "filter sql");
        }

        Ok(SqlResult { query, params: where_result.params })
    }

    pub fn to_where_sql(&self) -> Result<SqlResult, FilterError> {
        let (query, params) = match self.where_data {
            Some(ref where_data) => FilterWhere::generate(where_data, 0, Some(self.entity), &self.options)?,
            None => FilterWhere::generate_empty(0, &self.options),
        };
        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let query = format!(
            "SELECT COUNT(*) AS count FROM \"{}\" AS t WHERE {}",
            self.entity.table, where_result.query
        );
        Ok(SqlResult { query, params: where_result.params })
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            return "to_jsonb(t)".to_string();
        }
        let pairs = self
            .select_columns
            .iter()
            .map(|c| format!("'{}', t.\"{}\"", c, c))
            .collect::<Vec<_>>()
            .join(", ");
        format!("jsonb_build_object({})", pairs)
    }

    fn build_limit_clause(&self) -> String {
        let limit = self
            .limit
            .unwrap_or(crate::config::config().filter.default_limit);
        match self.offset {
            Some(o) => format!("LIMIT {} OFFSET {}", limit, o),
            None => format!("LIMIT {}", limit),
        }
    }
}

/// Identifiers must be plain `[A-Za-z_][A-Za-z0-9_]*`
pub fn validate_identifier(name: &str) -> Result<(), FilterError> {
    let mut chars = name.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(FilterError::InvalidColumn(format!("Invalid identifier: {}", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entity::{AUDIT_LOGS, TASKS};
    use serde_json::json;

    #[test]
    fn select_builds_json_projection() {
        let practice = Uuid::new_v4();
        let mut filter = Filter::new(&TASKS);
        filter.scoped(practice);
        filter
            .assign(FilterData {
                select: Some(vec!["id".into(), "title".into()]),
                where_clause: Some(json!({ "status": "pending" })),
                order: Some(json!("due_date asc")),
                limit: Some(20),
                offset: Some(40),
            })
            .unwrap();

        let sql = filter.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT jsonb_build_object('id', t.\"id\", 'title', t.\"title\") AS record \
             FROM \"tasks\" AS t \
             WHERE \"practice_id\" = $1::uuid AND \"deleted_at\" IS NULL AND \"status\" = $2::text \
             ORDER BY \"due_date\" ASC LIMIT 20 OFFSET 40"
        );
        assert_eq!(sql.params.len(), 2);
    }

    #[test]
    fn default_projection_and_limit() {
        let filter = Filter::new(&AUDIT_LOGS);
        let sql = filter.to_sql().unwrap();
        assert!(sql.query.starts_with("SELECT to_jsonb(t) AS record FROM \"audit_logs\" AS t WHERE 1=1"));
        assert!(sql.query.contains("LIMIT"));
    }

    #[test]
    fn count_shares_where_clause() {
        let mut filter = Filter::new(&TASKS);
        filter.where_clause(json!({ "status": { "$ne": "completed" } })).unwrap();
        let sql = filter.to_count_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT COUNT(*) AS count FROM \"tasks\" AS t WHERE \"deleted_at\" IS NULL AND \"status\" <> $1::text"
        );
    }

    #[test]
    fn limit_is_capped_and_validated() {
        let mut filter = Filter::new(&TASKS);
        assert!(filter.limit(-1, None).is_err());
        assert!(filter.limit(10, Some(-5)).is_err());
        filter.limit(1_000_000, None).unwrap();
        let max = crate::config::config().filter.max_limit.unwrap();
        assert!(filter.to_sql().unwrap().query.ends_with(&format!("LIMIT {}", max)));
    }

    #[test]
    fn unknown_select_columns_are_rejected() {
        let mut filter = Filter::new(&TASKS);
        assert!(filter.select(vec!["password_hash".into()]).is_err());
    }

    #[test]
    fn identifiers() {
        assert!(validate_identifier("due_date").is_ok());
        assert!(validate_identifier("_x1").is_ok());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("name; drop").is_err());
        assert!(validate_identifier("").is_err());
    }
}
