use axum::{extract::Request, middleware::Next, response::Response};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::entity::EntityDef;
use crate::database::models::{Practice, User};
use crate::database::{DatabaseManager, Repository};
use crate::error::ApiError;
use crate::observer::Actor;
use crate::types::Role;

use super::auth::AuthUser;

/// Lets a master act inside another practice
pub const PRACTICE_HEADER: &str = "x-practice-id";

/// The practice a request operates on and the user acting in it
#[derive(Clone, Debug)]
pub struct PracticeScope {
    pub practice_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub email: String,
    pub name: String,
}

impl PracticeScope {
    pub fn actor(&self) -> Actor {
        Actor { user_id: self.user_id, role: self.role }
    }

    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        if !self.role.at_least(role) {
            return Err(ApiError::forbidden(format!("Requires {} role", role)));
        }
        Ok(())
    }

    pub fn repository(&self, entity: &'static EntityDef, pool: PgPool) -> Repository {
        Repository::new(entity, self.practice_id, pool)
    }
}

/// Practice the request targets: the user's own unless a master names another
pub fn resolve_practice(home: Uuid, role: Role, header: Option<&str>) -> Result<Uuid, ApiError> {
    let Some(raw) = header.map(str::trim).filter(|h| !h.is_empty()) else {
        return Ok(home);
    };
    let requested = Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("Invalid x-practice-id header"))?;
    if requested != home && role != Role::Master {
        return Err(ApiError::forbidden("You do not have access to this practice"));
    }
    Ok(requested)
}

/// Loads the session user and practice, refusing stale or inactive sessions
pub async fn practice_scope_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
    let pool = DatabaseManager::pool()?;

    let query = format!(
        "SELECT {} FROM users WHERE id = $1 AND is_active AND deleted_at IS NULL",
        User::COLUMNS
    );
    let user = sqlx::query_as::<_, User>(&query)
        .bind(auth_user.user_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| {
            tracing::warn!("Session for inactive or missing user {}", auth_user.user_id);
            ApiError::unauthorized("User account is not active")
        })?;

    if user.role != auth_user.role || user.practice_id != auth_user.practice_id {
        return Err(ApiError::unauthorized("Session is out of date, please sign in again"));
    }

    let header = request.headers().get(PRACTICE_HEADER).and_then(|v| v.to_str().ok());
    let practice_id = resolve_practice(user.practice_id, user.role, header)?;

    let query = format!(
        "SELECT {} FROM practices WHERE id = $1 AND deleted_at IS NULL",
        Practice::COLUMNS
    );
    let practice = sqlx::query_as::<_, Practice>(&query)
        .bind(practice_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Practice not found"))?;
    if !practice.is_usable() {
        return Err(ApiError::forbidden("Practice is not active"));
    }

    if practice_id != user.practice_id {
        tracing::info!("Master {} acting in practice {}", user.email, practice_id);
    }

    request.extensions_mut().insert(PracticeScope {
        practice_id,
        user_id: user.id,
        role: user.role,
        email: user.email,
        name: user.name,
    });
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_practice_by_default() {
        let home = Uuid::new_v4();
        assert_eq!(resolve_practice(home, Role::Admin, None).unwrap(), home);
        assert_eq!(resolve_practice(home, Role::Admin, Some("  ")).unwrap(), home);
        assert_eq!(resolve_practice(home, Role::Staff, Some(&home.to_string())).unwrap(), home);
    }

    #[test]
    fn only_masters_may_switch_practice() {
        let home = Uuid::new_v4();
        let other = Uuid::new_v4().to_string();
        assert!(matches!(resolve_practice(home, Role::Admin, Some(&other)), Err(ApiError::Forbidden(_))));
        assert_eq!(resolve_practice(home, Role::Master, Some(&other)).unwrap().to_string(), other);
        assert!(matches!(resolve_practice(home, Role::Master, Some("nope")), Err(ApiError::BadRequest(_))));
    }
}
