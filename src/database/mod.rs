pub mod entity;
pub mod manager;
pub mod models;
pub mod query_builder;
pub mod repository;

pub use entity::{ColumnDef, ColumnKind, EntityDef};
pub use manager::{DatabaseError, DatabaseManager};
pub use repository::Repository;
