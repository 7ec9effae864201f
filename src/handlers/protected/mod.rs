// Protected handlers: every route here runs behind the session and
// practice-scope middleware, so `PracticeScope` is always present.

pub mod ai;
pub mod auth;
pub mod compliance;
pub mod dashboard;
pub mod entity;
pub mod fridges;
pub mod notifications;
pub mod practice;
pub mod reports;
pub mod tasks;
pub mod users;

pub use entity::EntityRoute;
