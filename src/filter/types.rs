use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,

    Like,
    ILike,

    In,
    NIn,

    Any,
    All,
    Size,

    Between,
    Null,

    /// Pre-rendered SQL fragment (logical operator output)
    Raw,
}

/// Filter request accepted by list/find endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterData {
    #[serde(default)]
    pub select: Option<Vec<String>>,
    #[serde(default, rename = "where")]
    pub where_clause: Option<serde_json::Value>,
    #[serde(default)]
    pub order: Option<serde_json::Value>,
    #[serde(default)]
    pub limit: Option<i32>,
    #[serde(default)]
    pub offset: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct FilterWhereInfo {
    pub column: String,
    pub operator: FilterOp,
    pub data: serde_json::Value,
}

/// Conditions injected around every user-supplied where clause
#[derive(Debug, Clone, Default)]
pub struct FilterWhereOptions {
    /// Table has a `deleted_at` column that should hide rows
    pub soft_delete: bool,
    pub include_deleted: bool,
    /// Restrict rows to one practice
    pub practice_scope: Option<Uuid>,
}

impl FilterWhereOptions {
    /// Options for nested logical clauses: scope and soft-delete apply once at the top
    pub fn nested() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

/// Rendered SQL plus positional parameters. Parameters are bound as text and
/// cast in SQL, so `None` means SQL NULL.
#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Option<String>>,
}
