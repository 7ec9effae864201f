use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::auth::{self, AuthError};
use crate::database::manager::DatabaseError;
use crate::database::models::{Practice, User};
use crate::types::Role;

#[derive(Debug, thiserror::Error)]
pub enum PracticeError {
    #[error("{0}")]
    AlreadyExists(String),
    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl PracticeError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        PracticeError::InvalidInput { field: field.to_string(), message: message.into() }
    }
}

impl From<sqlx::Error> for PracticeError {
    fn from(err: sqlx::Error) -> Self {
        PracticeError::Database(err.into())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPractice {
    pub name: String,
    pub ods_code: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PracticeChanges {
    pub name: Option<String>,
    pub ods_code: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    #[serde(default = "default_role")]
    pub role: Role,
    pub password: String,
}

fn default_role() -> Role {
    Role::Staff
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

/// Trimmed, lower-cased email with a minimal shape check
pub fn normalize_email(email: &str) -> Result<String, PracticeError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') => Ok(email),
        _ => Err(PracticeError::invalid("email", "must be a valid email address")),
    }
}

fn require_name(field: &str, value: &str) -> Result<String, PracticeError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PracticeError::invalid(field, "must not be blank"));
    }
    Ok(value.to_string())
}

/// A caller may only hand out roles up to their own
pub fn check_role_grant(caller: Role, requested: Role) -> Result<(), PracticeError> {
    if requested > caller {
        return Err(PracticeError::invalid(
            "role",
            format!("cannot assign role '{}' above your own", requested),
        ));
    }
    Ok(())
}

/// Practices and their user accounts
pub struct PracticeService {
    pool: PgPool,
}

impl PracticeService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a practice together with its first admin account
    pub async fn register(&self, practice: NewPractice, admin: NewUser) -> Result<(Practice, User), PracticeError> {
        let name = require_name("name", &practice.name)?;
        let email = normalize_email(&admin.email)?;
        let admin_name = require_name("admin_name", &admin.name)?;
        let password_hash = auth::hash_password(&admin.password).await?;

        let mut tx = self.pool.begin().await?;
        self.ensure_email_free(&mut tx, &email).await?;

        if let Some(ods) = practice.ods_code.as_deref().filter(|s| !s.trim().is_empty()) {
            let (taken,): (bool,) = sqlx::query_as(
                "SELECT EXISTS(SELECT 1 FROM practices WHERE lower(ods_code) = lower($1))",
            )
            .bind(ods.trim())
            .fetch_one(&mut *tx)
            .await?;
            if taken {
                return Err(PracticeError::AlreadyExists(format!("Practice with ODS code {} already exists", ods)));
            }
        }

        let query = format!(
            "INSERT INTO practices (name, ods_code, address, email, phone)
             VALUES ($1, NULLIF(trim($2), ''), $3, $4, $5)
             RETURNING {}",
            Practice::COLUMNS
        );
        let created = sqlx::query_as::<_, Practice>(&query)
            .bind(&name)
            .bind(&practice.ods_code)
            .bind(&practice.address)
            .bind(&practice.email)
            .bind(&practice.phone)
            .fetch_one(&mut *tx)
            .await?;

        let user = Self::insert_user(&mut tx, created.id, &email, &admin_name, Role::Admin, &password_hash).await?;
        tx.commit().await?;

        tracing::info!("Registered practice '{}' ({}) with admin {}", created.name, created.id, user.email);
        Ok((created, user))
    }

    pub async fn list_practices(&self) -> Result<Vec<Practice>, PracticeError> {
        let query = format!(
            "SELECT {} FROM practices WHERE deleted_at IS NULL ORDER BY name",
            Practice::COLUMNS
        );
        Ok(sqlx::query_as::<_, Practice>(&query).fetch_all(&self.pool).await?)
    }

    pub async fn get_practice(&self, id: Uuid) -> Result<Practice, PracticeError> {
        let query = format!("SELECT {} FROM practices WHERE id = $1 AND deleted_at IS NULL", Practice::COLUMNS);
        sqlx::query_as::<_, Practice>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PracticeError::NotFound(format!("practice {} not found", id)))
    }

    pub async fn update_practice(&self, id: Uuid, changes: PracticeChanges) -> Result<Practice, PracticeError> {
        let name = changes.name.as_deref().map(|n| require_name("name", n)).transpose()?;
        let query = format!(
            "UPDATE practices
                SET name = COALESCE($2, name),
                    ods_code = COALESCE(NULLIF(trim($3), ''), ods_code),
                    address = COALESCE($4, address),
                    email = COALESCE($5, email),
                    phone = COALESCE($6, phone),
                    is_active = COALESCE($7, is_active),
                    updated_at = now()
              WHERE id = $1 AND deleted_at IS NULL
              RETURNING {}",
            Practice::COLUMNS
        );
        sqlx::query_as::<_, Practice>(&query)
            .bind(id)
            .bind(name)
            .bind(changes.ods_code)
            .bind(changes.address)
            .bind(changes.email)
            .bind(changes.phone)
            .bind(changes.is_active)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PracticeError::NotFound(format!("practice {} not found", id)))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, PracticeError> {
        let query = format!(
            "SELECT {} FROM users WHERE lower(email) = lower($1) AND deleted_at IS NULL",
            User::COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>, PracticeError> {
        let query = format!("SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL", User::COLUMNS);
        Ok(sqlx::query_as::<_, User>(&query).bind(id).fetch_optional(&self.pool).await?)
    }

    /// Check credentials and record the sign-in
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, PracticeError> {
        let user = self
            .find_user_by_email(email)
            .await?
            .filter(User::can_sign_in)
            .ok_or(AuthError::InvalidCredentials)?;
        if !auth::verify_password(password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let practice = self.get_practice(user.practice_id).await;
        if !matches!(practice, Ok(ref p) if p.is_usable()) {
            tracing::warn!("Sign-in refused for {}: practice inactive", user.email);
            return Err(AuthError::InvalidCredentials.into());
        }

        sqlx::query("UPDATE users SET last_login_at = now() WHERE id = $1")
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn list_users(&self, practice_id: Uuid) -> Result<Vec<User>, PracticeError> {
        let query = format!(
            "SELECT {} FROM users WHERE practice_id = $1 AND deleted_at IS NULL ORDER BY name",
            User::COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&query).bind(practice_id).fetch_all(&self.pool).await?)
    }

    pub async fn create_user(&self, practice_id: Uuid, caller_role: Role, new_user: NewUser) -> Result<User, PracticeError> {
        check_role_grant(caller_role, new_user.role)?;
        let email = normalize_email(&new_user.email)?;
        let name = require_name("name", &new_user.name)?;
        let password_hash = auth::hash_password(&new_user.password).await?;

        let mut tx = self.pool.begin().await?;
        self.ensure_email_free(&mut tx, &email).await?;
        let user = Self::insert_user(&mut tx, practice_id, &email, &name, new_user.role, &password_hash).await?;
        tx.commit().await?;

        tracing::info!("Created user {} with role {} in practice {}", user.email, user.role, practice_id);
        Ok(user)
    }

    pub async fn update_user(
        &self,
        practice_id: Uuid,
        caller: (Uuid, Role),
        id: Uuid,
        changes: UserChanges,
    ) -> Result<User, PracticeError> {
        let (caller_id, caller_role) = caller;
        if let Some(role) = changes.role {
            check_role_grant(caller_role, role)?;
        }
        if changes.is_active == Some(false) && caller_id == id {
            return Err(PracticeError::invalid("is_active", "you cannot deactivate your own account"));
        }

        let target = self
            .get_user(id)
            .await?
            .filter(|u| u.practice_id == practice_id)
            .ok_or_else(|| PracticeError::NotFound(format!("user {} not found", id)))?;
        if target.role > caller_role {
            return Err(PracticeError::invalid("role", "cannot modify a user with a higher role"));
        }

        let email = changes.email.as_deref().map(normalize_email).transpose()?;
        if let Some(ref email) = email {
            if !email.eq_ignore_ascii_case(&target.email) {
                let mut tx = self.pool.begin().await?;
                self.ensure_email_free(&mut tx, email).await?;
                tx.commit().await?;
            }
        }
        let name = changes.name.as_deref().map(|n| require_name("name", n)).transpose()?;
        let password_hash = match changes.password.as_deref() {
            Some(password) => Some(auth::hash_password(password).await?),
            None => None,
        };

        let query = format!(
            "UPDATE users
                SET name = COALESCE($3, name),
                    email = COALESCE($4, email),
                    role = COALESCE($5, role),
                    is_active = COALESCE($6, is_active),
                    password_hash = COALESCE($7, password_hash),
                    updated_at = now()
              WHERE id = $1 AND practice_id = $2 AND deleted_at IS NULL
              RETURNING {}",
            User::COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(practice_id)
            .bind(name)
            .bind(email)
            .bind(changes.role.map(|r| r.as_str()))
            .bind(changes.is_active)
            .bind(password_hash)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PracticeError::NotFound(format!("user {} not found", id)))?;
        Ok(user)
    }

    /// Deactivation keeps the row so audit history still resolves
    pub async fn deactivate_user(&self, practice_id: Uuid, caller: (Uuid, Role), id: Uuid) -> Result<User, PracticeError> {
        self.update_user(practice_id, caller, id, UserChanges { is_active: Some(false), ..Default::default() })
            .await
    }

    pub async fn change_password(&self, user_id: Uuid, current: &str, new_password: &str) -> Result<(), PracticeError> {
        let user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| PracticeError::NotFound(format!("user {} not found", user_id)))?;
        if !auth::verify_password(current, &user.password_hash).await? {
            return Err(PracticeError::invalid("current_password", "is incorrect"));
        }
        let hash = auth::hash_password(new_password).await?;
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(hash)
            .execute(&self.pool)
            .await?;
        tracing::info!("Password changed for user {}", user_id);
        Ok(())
    }

    async fn ensure_email_free(&self, tx: &mut Transaction<'_, Postgres>, email: &str) -> Result<(), PracticeError> {
        let (taken,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = lower($1) AND deleted_at IS NULL)",
        )
        .bind(email)
        .fetch_one(&mut **tx)
        .await?;
        if taken {
            return Err(PracticeError::AlreadyExists(format!("A user with email {} already exists", email)));
        }
        Ok(())
    }

    async fn insert_user(
        tx: &mut Transaction<'_, Postgres>,
        practice_id: Uuid,
        email: &str,
        name: &str,
        role: Role,
        password_hash: &str,
    ) -> Result<User, PracticeError> {
        let query = format!(
            "INSERT INTO users (practice_id, email, name, role, password_hash)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            User::COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(practice_id)
            .bind(email)
            .bind(name)
            .bind(role.as_str())
            .bind(password_hash)
            .fetch_one(&mut **tx)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Practice.Manager@Example.NHS.uk ").unwrap(), "practice.manager@example.nhs.uk");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("a@localhost").is_err());
    }

    #[test]
    fn roles_cannot_be_escalated() {
        assert!(check_role_grant(Role::Admin, Role::Manager).is_ok());
        assert!(check_role_grant(Role::Admin, Role::Admin).is_ok());
        assert!(matches!(
            check_role_grant(Role::Manager, Role::Admin),
            Err(PracticeError::InvalidInput { ref field, .. }) if field == "role"
        ));
    }

    #[test]
    fn new_users_default_to_staff() {
        let user: NewUser =
            serde_json::from_value(serde_json::json!({ "email": "a@b.com", "name": "A", "password": "password1" })).unwrap();
        assert_eq!(user.role, Role::Staff);
    }
}
