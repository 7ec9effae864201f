use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterOrderInfo, SortDirection};
use crate::database::entity::EntityDef;

pub struct FilterOrder;

impl FilterOrder {
    /// Accepts `"created_at desc, title"`, `["created_at desc"]` or
    /// `{"created_at": "desc"}`. Columns are checked against the entity.
    pub fn validate_and_parse(
        order: &Value,
        entity: Option<&'static EntityDef>,
    ) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let parsed = match order {
            Value::Null => vec![],
            Value::String(s) => Self::parse_order_string(s)?,
            Value::Array(arr) => {
                let mut out = Vec::new();
                for v in arr {
                    let s = v.as_str().ok_or_else(|| {
                        FilterError::InvalidOperatorData("order array must contain strings".to_string())
                    })?;
                    out.extend(Self::parse_order_string(s)?);
                }
                out
            }
            Value::Object(obj) => {
                let mut out = Vec::new();
                for (k, v) in obj {
                    let dir = v.as_str().unwrap_or("asc");
                    out.push(FilterOrderInfo { column: k.clone(), sort: Self::parse_direction(dir)? });
                }
                out
            }
            _ => {
                return Err(FilterError::InvalidOperatorData(
                    "order must be a string, array or object".to_string(),
                ))
            }
        };

        for info in &parsed {
            match entity {
                Some(entity) if entity.column(&info.column).is_none() => {
                    return Err(FilterError::InvalidColumn(format!("Unknown column: {}", info.column)));
                }
                Some(_) => {}
                None => super::filter::validate_identifier(&info.column)?,
            }
        }
        Ok(parsed)
    }

    fn parse_direction(dir: &str) -> Result<SortDirection, FilterError> {
        match dir.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(FilterError::InvalidOperatorData(format!("Invalid sort direction: {}", other))),
        }
    }

    fn parse_order_string(s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let mut it = part.split_whitespace();
            let Some(col) = it.next() else { continue };
            let sort = Self::parse_direction(it.next().unwrap_or("asc"))?;
            if it.next().is_some() {
                return Err(FilterError::InvalidOperatorData(format!("Invalid order term: {}", part.trim())));
            }
            out.push(FilterOrderInfo { column: col.to_string(), sort });
        }
        Ok(out)
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> Result<String, FilterError> {
        if infos.is_empty() {
            return Ok(String::new());
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entity::TASKS;
    use serde_json::json;

    #[test]
    fn string_form_with_mixed_directions() {
        let infos = FilterOrder::validate_and_parse(&json!("due_date desc, title"), Some(&TASKS)).unwrap();
        assert_eq!(FilterOrder::generate(&infos).unwrap(), "ORDER BY \"due_date\" DESC, \"title\" ASC");
    }

    #[test]
    fn object_form() {
        let infos = FilterOrder::validate_and_parse(&json!({ "created_at": "DESC" }), Some(&TASKS)).unwrap();
        assert_eq!(infos[0].sort, SortDirection::Desc);
    }

    #[test]
    fn rejects_unknown_columns_and_injection() {
        assert!(FilterOrder::validate_and_parse(&json!("nope desc"), Some(&TASKS)).is_err());
        assert!(FilterOrder::validate_and_parse(&json!("title; drop table tasks"), Some(&TASKS)).is_err());
        assert!(FilterOrder::validate_and_parse(&json!("title sideways"), Some(&TASKS)).is_err());
    }
}
