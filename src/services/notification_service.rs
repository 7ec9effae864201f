use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::Notification;
use crate::types::Role;

pub const PRIORITY_LOW: &str = "low";
pub const PRIORITY_NORMAL: &str = "normal";
pub const PRIORITY_HIGH: &str = "high";

pub const KIND_INFO: &str = "info";
pub const KIND_ALERT: &str = "alert";
pub const KIND_APPROVAL: &str = "approval";
pub const KIND_REMINDER: &str = "reminder";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub kind: String,
    pub priority: String,
    pub link: Option<String>,
}

impl NewNotification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind: KIND_INFO.to_string(),
            priority: PRIORITY_NORMAL.to_string(),
            link: None,
        }
    }

    pub fn kind(mut self, kind: &str) -> Self {
        self.kind = kind.to_string();
        self
    }

    pub fn priority(mut self, priority: &str) -> Self {
        self.priority = priority.to_string();
        self
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// Roles at or above `min`, as stored in `users.role`
fn roles_at_least(min: Role) -> Vec<String> {
    [Role::Staff, Role::Manager, Role::Admin, Role::Master]
        .into_iter()
        .filter(|r| r.at_least(min))
        .map(|r| r.as_str().to_string())
        .collect()
}

pub struct NotificationService {
    pool: PgPool,
}

impl NotificationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Notify one user. The user must be an active member of the practice.
    pub async fn notify_user(
        &self,
        practice_id: Uuid,
        user_id: Uuid,
        notification: &NewNotification,
    ) -> Result<Uuid, DatabaseError> {
        Self::insert_for_user(&self.pool, practice_id, user_id, notification).await
    }

    /// Notify every active user of the practice holding at least `min_role`.
    /// Returns the user ids that were notified.
    pub async fn notify_role(
        &self,
        practice_id: Uuid,
        min_role: Role,
        notification: &NewNotification,
    ) -> Result<Vec<Uuid>, DatabaseError> {
        Self::insert_for_role(&self.pool, practice_id, min_role, notification).await
    }

    pub async fn insert_for_user<'e, E: PgExecutor<'e>>(
        executor: E,
        practice_id: Uuid,
        user_id: Uuid,
        notification: &NewNotification,
    ) -> Result<Uuid, DatabaseError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "INSERT INTO notifications (practice_id, user_id, title, message, kind, priority, link)
             SELECT $1, u.id, $3, $4, $5, $6, $7
               FROM users u
              WHERE u.id = $2
                AND u.practice_id = $1
                AND u.is_active
                AND u.deleted_at IS NULL
             RETURNING id",
        )
        .bind(practice_id)
        .bind(user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.kind)
        .bind(&notification.priority)
        .bind(&notification.link)
        .fetch_optional(executor)
        .await?;

        let (id,) = row.ok_or_else(|| {
            DatabaseError::NotFound(format!("user {} is not an active member of practice {}", user_id, practice_id))
        })?;
        tracing::debug!("Notification {} created for user {}", id, user_id);
        Ok(id)
    }

    pub async fn insert_for_role<'e, E: PgExecutor<'e>>(
        executor: E,
        practice_id: Uuid,
        min_role: Role,
        notification: &NewNotification,
    ) -> Result<Vec<Uuid>, DatabaseError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "INSERT INTO notifications (practice_id, user_id, title, message, kind, priority, link)
             SELECT $1, u.id, $3, $4, $5, $6, $7
               FROM users u
              WHERE u.practice_id = $1
                AND u.role = ANY($2)
                AND u.is_active
                AND u.deleted_at IS NULL
             RETURNING user_id",
        )
        .bind(practice_id)
        .bind(roles_at_least(min_role))
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.kind)
        .bind(&notification.priority)
        .bind(&notification.link)
        .fetch_all(executor)
        .await?;

        tracing::debug!(
            "Notification '{}' sent to {} users with role >= {}",
            notification.title,
            rows.len(),
            min_role
        );
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM notifications
              WHERE user_id = $1 AND ($2 = false OR is_read = false)
              ORDER BY created_at DESC
              LIMIT $3",
            Notification::COLUMNS
        );
        let rows = sqlx::query_as::<_, Notification>(&query)
            .bind(user_id)
            .bind(unread_only)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64, DatabaseError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = false")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<Notification, DatabaseError> {
        let query = format!(
            "UPDATE notifications
                SET is_read = true, read_at = COALESCE(read_at, now()), updated_at = now()
              WHERE id = $1 AND user_id = $2
              RETURNING {}",
            Notification::COLUMNS
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("notification {} not found", id)))
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE notifications
                SET is_read = true, read_at = now(), updated_at = now()
              WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_expansion_includes_higher_roles() {
        assert_eq!(roles_at_least(Role::Manager), vec!["manager", "admin", "master"]);
        assert_eq!(roles_at_least(Role::Master), vec!["master"]);
        assert_eq!(roles_at_least(Role::Staff).len(), 4);
    }

    #[test]
    fn builder_defaults() {
        let n = NewNotification::new("Fridge alert", "Out of range")
            .kind(KIND_ALERT)
            .priority(PRIORITY_HIGH)
            .link("/fridges/1");
        assert_eq!(n.kind, "alert");
        assert_eq!(n.priority, "high");
        assert_eq!(n.link.as_deref(), Some("/fridges/1"));
        assert_eq!(NewNotification::new("a", "b").priority, PRIORITY_NORMAL);
    }
}
