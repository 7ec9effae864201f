use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterOp, FilterWhereInfo, FilterWhereOptions};
use crate::database::entity::{ColumnKind, EntityDef};

/// Renders a JSON where clause into SQL with positional, text-bound
/// parameters. Parameter numbering starts after `starting_param_index` and
/// continues through nested `$and`/`$or`/`$not` clauses.
pub struct FilterWhere {
    entity: Option<&'static EntityDef>,
    param_values: Vec<Option<String>>,
    param_index: usize,
    depth: u32,
    conditions: Vec<FilterWhereInfo>,
}

impl FilterWhere {
    pub fn new(entity: Option<&'static EntityDef>, starting_param_index: usize) -> Self {
        Self {
            entity,
            param_values: vec![],
            param_index: starting_param_index,
            depth: 0,
            conditions: vec![],
        }
    }

    pub fn generate(
        where_data: &Value,
        starting_param_index: usize,
        entity: Option<&'static EntityDef>,
        options: &FilterWhereOptions,
    ) -> Result<(String, Vec<Option<String>>), FilterError> {
        let mut filter_where = Self::new(entity, starting_param_index);
        filter_where.build(where_data, options)
    }

    pub fn generate_empty(
        starting_param_index: usize,
        options: &FilterWhereOptions,
    ) -> (String, Vec<Option<String>>) {
        let mut filter_where = Self::new(None, starting_param_index);
        let conditions = filter_where.scope_conditions(options);
        (Self::join(conditions, " AND "), filter_where.param_values)
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            Value::String(_) => Err(FilterError::InvalidWhereClause(
                "Raw SQL where clauses are not supported".to_string(),
            )),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn build(
        &mut self,
        where_data: &Value,
        options: &FilterWhereOptions,
    ) -> Result<(String, Vec<Option<String>>), FilterError> {
        Self::validate(where_data)?;

        let mut sql_conditions = self.scope_conditions(options);

        self.parse_where_data(where_data)?;
        let conditions = std::mem::take(&mut self.conditions);
        for condition in &conditions {
            sql_conditions.push(self.build_sql_condition(condition)?);
        }

        Ok((Self::join(sql_conditions, " AND "), std::mem::take(&mut self.param_values)))
    }

    fn scope_conditions(&mut self, options: &FilterWhereOptions) -> Vec<String> {
        let mut conditions = vec![];
        if let Some(practice_id) = options.practice_scope {
            let param = self.push_param(Some(practice_id.to_string()));
            conditions.push(format!("\"practice_id\" = {}::uuid", param));
        }
        if options.soft_delete && !options.include_deleted {
            conditions.push("\"deleted_at\" IS NULL".to_string());
        }
        conditions
    }

    fn join(conditions: Vec<String>, joiner: &str) -> String {
        if conditions.is_empty() {
            "1=1".to_string()
        } else {
            conditions.join(joiner)
        }
    }

    fn parse_where_data(&mut self, where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null => Ok(()),
            Value::Object(obj) => {
                for (key, value) in obj {
                    if key.starts_with('$') {
                        self.parse_logical_operator(key, value)?;
                    } else {
                        self.parse_field_condition(key, value)?;
                    }
                }
                Ok(())
            }
            _ => Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        }
    }

    /// Render a nested clause into this builder's parameter list
    fn nested(&mut self, value: &Value) -> Result<String, FilterError> {
        let max_depth = crate::config::config().filter.max_nested_depth;
        if self.depth + 1 > max_depth {
            return Err(FilterError::InvalidWhereClause(format!(
                "Nesting deeper than {} levels",
                max_depth
            )));
        }

        let mut child = Self::new(self.entity, self.param_index);
        child.depth = self.depth + 1;
        let (sql, params) = child.build(value, &FilterWhereOptions::nested())?;
        self.param_index = child.param_index;
        self.param_values.extend(params);
        Ok(sql)
    }

    fn parse_logical_operator(&mut self, op: &str, value: &Value) -> Result<(), FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                if arr.is_empty() {
                    return Ok(());
                }
                let mut sql_parts = Vec::with_capacity(arr.len());
                for v in arr {
                    sql_parts.push(format!("({})", self.nested(v)?));
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                self.conditions.push(FilterWhereInfo {
                    column: format!("({})", sql_parts.join(joiner)),
                    operator: FilterOp::Raw,
                    data: Value::Null,
                });
                Ok(())
            }
            "$not" => {
                let sql = self.nested(value)?;
                self.conditions.push(FilterWhereInfo {
                    column: format!("NOT ({})", sql),
                    operator: FilterOp::Raw,
                    data: Value::Null,
                });
                Ok(())
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(&mut self, field: &str, value: &Value) -> Result<(), FilterError> {
        self.column_kind(field)?;

        match value {
            Value::Object(obj) if obj.keys().all(|k| k.starts_with('$')) && !obj.is_empty() => {
                for (op_key, op_val) in obj {
                    let operator = Self::map_operator(op_key)?;
                    self.conditions.push(FilterWhereInfo {
                        column: field.to_string(),
                        operator,
                        data: op_val.clone(),
                    });
                }
            }
            // Implicit equality: { field: value }
            _ => self.conditions.push(FilterWhereInfo {
                column: field.to_string(),
                operator: FilterOp::Eq,
                data: value.clone(),
            }),
        }
        Ok(())
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Neq,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$between" => FilterOp::Between,
            "$any" => FilterOp::Any,
            "$all" => FilterOp::All,
            "$size" => FilterOp::Size,
            "$null" => FilterOp::Null,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    /// Column type used for casting; unbound filters treat everything as text
    fn column_kind(&self, column: &str) -> Result<ColumnKind, FilterError> {
        match self.entity {
            Some(entity) => entity
                .column(column)
                .map(|c| c.kind)
                .ok_or_else(|| FilterError::InvalidColumn(format!("Unknown column: {}", column))),
            None => {
                super::filter::validate_identifier(column)
                    .map_err(|_| FilterError::InvalidColumn(format!("Invalid column name format: {}", column)))?;
                Ok(ColumnKind::Text)
            }
        }
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        if condition.operator == FilterOp::Raw {
            return Ok(condition.column.clone());
        }

        let column = condition.column.as_str();
        let kind = self.column_kind(column)?;
        let quoted = format!("\"{}\"", column);
        let data = &condition.data;

        let sql = match condition.operator {
            FilterOp::Eq if data.is_null() => format!("{} IS NULL", quoted),
            FilterOp::Neq if data.is_null() => format!("{} IS NOT NULL", quoted),
            FilterOp::Eq => format!("{} = {}", quoted, self.param(column, kind, data)?),
            FilterOp::Neq => format!("{} <> {}", quoted, self.param(column, kind, data)?),
            FilterOp::Gt => format!("{} > {}", quoted, self.param(column, kind, data)?),
            FilterOp::Gte => format!("{} >= {}", quoted, self.param(column, kind, data)?),
            FilterOp::Lt => format!("{} < {}", quoted, self.param(column, kind, data)?),
            FilterOp::Lte => format!("{} <= {}", quoted, self.param(column, kind, data)?),
            FilterOp::Like => format!("{}::text LIKE {}", quoted, self.param(column, ColumnKind::Text, data)?),
            FilterOp::ILike => format!("{}::text ILIKE {}", quoted, self.param(column, ColumnKind::Text, data)?),
            FilterOp::In | FilterOp::NIn => {
                let values = Self::as_list(data);
                let negate = condition.operator == FilterOp::NIn;
                if values.is_empty() {
                    return Ok(if negate { "1=1" } else { "1=0" }.to_string());
                }
                let params = self.params(column, kind, &values)?;
                let keyword = if negate { "NOT IN" } else { "IN" };
                format!("{} {} ({})", quoted, keyword, params.join(", "))
            }
            FilterOp::Between => {
                let values = data.as_array().filter(|v| v.len() == 2).ok_or_else(|| {
                    FilterError::InvalidOperatorData("$between requires exactly 2 values".to_string())
                })?;
                let low = self.param(column, kind, &values[0])?;
                let high = self.param(column, kind, &values[1])?;
                format!("{} BETWEEN {} AND {}", quoted, low, high)
            }
            FilterOp::Any | FilterOp::All | FilterOp::Size
                if self.entity.is_some() && kind != ColumnKind::TextArray =>
            {
                return Err(FilterError::InvalidOperatorData(format!(
                    "array operators need an array column, '{}' is not one",
                    column
                )));
            }
            FilterOp::Any | FilterOp::All => {
                let values = Self::as_list(data);
                if values.is_empty() {
                    let trivially = condition.operator == FilterOp::All;
                    return Ok(if trivially { "1=1" } else { "1=0" }.to_string());
                }
                let element = if kind == ColumnKind::TextArray { ColumnKind::Text } else { kind };
                let params = self.params(column, element, &values)?;
                let operator = if condition.operator == FilterOp::Any { "&&" } else { "@>" };
                format!("{} {} ARRAY[{}]", quoted, operator, params.join(", "))
            }
            FilterOp::Size => {
                let size = self.param(column, ColumnKind::Integer, data)?;
                format!("COALESCE(array_length({}, 1), 0) = {}", quoted, size)
            }
            FilterOp::Null => match data {
                Value::Bool(true) => format!("{} IS NULL", quoted),
                Value::Bool(false) => format!("{} IS NOT NULL", quoted),
                _ => {
                    return Err(FilterError::InvalidOperatorData(
                        "$null requires true or false".to_string(),
                    ))
                }
            },
            FilterOp::Raw => condition.column.clone(),
        };
        Ok(sql)
    }

    fn as_list(data: &Value) -> Vec<Value> {
        match data {
            Value::Array(values) => values.clone(),
            other => vec![other.clone()],
        }
    }

    fn params(&mut self, column: &str, kind: ColumnKind, values: &[Value]) -> Result<Vec<String>, FilterError> {
        values.iter().map(|v| self.param(column, kind, v)).collect()
    }

    fn param(&mut self, column: &str, kind: ColumnKind, value: &Value) -> Result<String, FilterError> {
        let rendered = kind.to_bind(value).map_err(|message| FilterError::InvalidValue {
            column: column.to_string(),
            message,
        })?;
        let placeholder = self.push_param(rendered);
        Ok(format!("{}{}", placeholder, kind.element_cast()))
    }

    fn push_param(&mut self, value: Option<String>) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entity::{FRIDGES, TASKS};
    use serde_json::json;
    use uuid::Uuid;

    fn tasks(where_data: Value) -> (String, Vec<Option<String>>) {
        FilterWhere::generate(&where_data, 0, Some(&TASKS), &FilterWhereOptions::default()).unwrap()
    }

    #[test]
    fn implicit_equality_casts_by_column_kind() {
        let id = Uuid::new_v4();
        let (sql, params) = tasks(json!({ "assigned_to": id.to_string(), "status": "pending" }));
        assert_eq!(sql, "\"assigned_to\" = $1::uuid AND \"status\" = $2::text");
        assert_eq!(params, vec![Some(id.to_string()), Some("pending".to_string())]);
    }

    #[test]
    fn scope_and_soft_delete_come_first() {
        let practice = Uuid::new_v4();
        let options = FilterWhereOptions {
            soft_delete: true,
            include_deleted: false,
            practice_scope: Some(practice),
        };
        let (sql, params) =
            FilterWhere::generate(&json!({ "due_date": { "$lt": "2024-06-01" } }), 0, Some(&TASKS), &options)
                .unwrap();
        assert_eq!(
            sql,
            "\"practice_id\" = $1::uuid AND \"deleted_at\" IS NULL AND \"due_date\" < $2::date"
        );
        assert_eq!(params[0], Some(practice.to_string()));
    }

    #[test]
    fn nested_clauses_continue_numbering() {
        let (sql, params) = tasks(json!({
            "status": "pending",
            "$or": [ { "category": "clinical" }, { "category": { "$in": ["estates", "hr"] } } ]
        }));
        // keys are visited in sorted order, so the $or clause is rendered first
        assert_eq!(
            sql,
            "((\"category\" = $1::text) OR (\"category\" IN ($2::text, $3::text))) AND \"status\" = $4::text"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let err = FilterWhere::generate(&json!({ "password_hash": "x" }), 0, Some(&TASKS), &FilterWhereOptions::default())
            .unwrap_err();
        assert!(matches!(err, FilterError::InvalidColumn(_)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = FilterWhere::generate(&json!({ "due_date": "soon" }), 0, Some(&TASKS), &FilterWhereOptions::default())
            .unwrap_err();
        assert!(matches!(err, FilterError::InvalidValue { .. }));
    }

    #[test]
    fn array_operators_cast_elements() {
        let (sql, _) = tasks(json!({ "tags": { "$any": ["cqc", "ipc"] } }));
        assert_eq!(sql, "\"tags\" && ARRAY[$1::text, $2::text]");
        let (sql, params) = tasks(json!({ "tags": { "$size": 0 } }));
        assert_eq!(sql, "COALESCE(array_length(\"tags\", 1), 0) = $1::integer");
        assert_eq!(params, vec![Some("0".to_string())]);
    }

    #[test]
    fn null_handling() {
        // object keys are visited in sorted order
        let (sql, params) = tasks(json!({ "completed_at": null, "assigned_to": { "$null": false } }));
        assert_eq!(sql, "\"assigned_to\" IS NOT NULL AND \"completed_at\" IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn array_operators_need_array_columns() {
        for where_data in [
            json!({ "title": { "$any": ["fire"] } }),
            json!({ "due_date": { "$all": ["2024-06-01"] } }),
            json!({ "status": { "$size": 2 } }),
        ] {
            let err = FilterWhere::generate(&where_data, 0, Some(&TASKS), &FilterWhereOptions::default()).unwrap_err();
            assert!(matches!(err, FilterError::InvalidOperatorData(_)), "{:?}", err);
        }
    }

    #[test]
    fn between_uses_two_params() {
        let (sql, _) = FilterWhere::generate(
            &json!({ "min_temp": { "$between": [1.5, 3] } }),
            0,
            Some(&FRIDGES),
            &FilterWhereOptions::default(),
        )
        .unwrap();
        assert_eq!(sql, "\"min_temp\" BETWEEN $1::numeric AND $2::numeric");
    }

    #[test]
    fn empty_in_matches_nothing() {
        let (sql, _) = tasks(json!({ "status": { "$in": [] } }));
        assert_eq!(sql, "1=0");
    }

    #[test]
    fn raw_sql_strings_are_refused() {
        assert!(FilterWhere::validate(&json!("1=1; drop table tasks")).is_err());
    }
}
