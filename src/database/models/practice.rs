use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Practice {
    pub id: Uuid,
    pub name: String,
    pub ods_code: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Practice {
    pub const COLUMNS: &'static str =
        "id, name, ods_code, address, email, phone, is_active, created_at, updated_at, deleted_at";

    pub fn is_usable(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}
