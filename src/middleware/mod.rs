pub mod audit;
pub mod auth;
pub mod practice;
pub mod response;

pub use audit::audit_middleware;
pub use auth::{jwt_auth_middleware, AuthUser};
pub use practice::{practice_scope_middleware, PracticeScope, PRACTICE_HEADER};
pub use response::{ApiResponse, ApiResult};
