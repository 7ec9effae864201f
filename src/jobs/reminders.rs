use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::database::manager::DatabaseError;
use crate::services::notification_service::{NewNotification, NotificationService, KIND_REMINDER};
use crate::types::Role;

pub const POLICY_REVIEW: &str = "policy_review";
pub const TASK_DUE: &str = "task_due";
pub const TRAINING_EXPIRY: &str = "training_expiry";
pub const MEDICAL_REQUEST_DUE: &str = "medical_request_due";

/// Who receives a reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    User(Uuid),
    AtLeast(Role),
}

/// A due or overdue item found by a reminder query
#[derive(Debug, Clone, FromRow)]
pub struct DueItem {
    pub id: Uuid,
    pub title: String,
    pub due_date: NaiveDate,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReminderSummary {
    pub practices: usize,
    pub notifications: usize,
    pub already_sent: usize,
    pub no_recipients: usize,
    pub failures: usize,
}

/// "overdue since", "due today" or "due on" wording
pub fn due_phrase(due_date: NaiveDate, today: NaiveDate) -> String {
    match (due_date - today).num_days() {
        d if d < 0 => format!("overdue since {}", due_date.format("%d %b %Y")),
        0 => "due today".to_string(),
        1 => "due tomorrow".to_string(),
        _ => format!("due on {}", due_date.format("%d %b %Y")),
    }
}

/// Notification text and default recipients for a reminder kind
pub fn reminder_for(kind: &str, item: &DueItem, today: NaiveDate) -> (NewNotification, Recipient) {
    let when = due_phrase(item.due_date, today);
    let (title, message, link, fallback) = match kind {
        POLICY_REVIEW => (
            "Policy review due",
            format!("\"{}\" review is {}.", item.title, when),
            format!("/policies/{}", item.id),
            Role::Admin,
        ),
        TASK_DUE => (
            "Task due",
            format!("\"{}\" is {}.", item.title, when),
            format!("/tasks/{}", item.id),
            Role::Manager,
        ),
        TRAINING_EXPIRY => (
            "Training expiring",
            format!("{} certificate is {}.", item.title, when.replace("due", "expiring")),
            format!("/training-records/{}", item.id),
            Role::Manager,
        ),
        _ => (
            "Medical request due",
            format!("Request from {} is {}.", item.title, when),
            format!("/medical-requests/{}", item.id),
            Role::Manager,
        ),
    };
    let recipient = item.user_id.map(Recipient::User).unwrap_or(Recipient::AtLeast(fallback));
    (NewNotification::new(title, message).kind(KIND_REMINDER).link(link), recipient)
}

const POLICY_SQL: &str = "SELECT p.id, p.title, p.review_date AS due_date, u.id AS user_id
    FROM policies p
    LEFT JOIN users u ON u.id = p.owner_id AND u.practice_id = p.practice_id
         AND u.is_active AND u.deleted_at IS NULL
   WHERE p.practice_id = $1 AND p.deleted_at IS NULL AND p.status <> 'archived'
     AND p.review_date <= $2 + $3::int";

const TASK_SQL: &str = "SELECT t.id, t.title, t.due_date, u.id AS user_id
    FROM tasks t
    LEFT JOIN employees e ON e.id = t.assigned_to AND e.practice_id = t.practice_id AND e.deleted_at IS NULL
    LEFT JOIN users u ON u.id = e.user_id AND u.practice_id = t.practice_id
         AND u.is_active AND u.deleted_at IS NULL
   WHERE t.practice_id = $1 AND t.deleted_at IS NULL
     AND t.status NOT IN ('completed', 'cancelled')
     AND t.due_date <= $2 + $3::int";

const TRAINING_SQL: &str = "SELECT r.id, e.name || ': ' || r.course_name AS title, r.expires_on AS due_date, u.id AS user_id
    FROM training_records r
    JOIN employees e ON e.id = r.employee_id AND e.practice_id = r.practice_id
    LEFT JOIN users u ON u.id = e.user_id AND u.practice_id = r.practice_id
         AND u.is_active AND u.deleted_at IS NULL
   WHERE r.practice_id = $1 AND r.deleted_at IS NULL
     AND r.expires_on BETWEEN $2 AND $2 + $3::int";

const MEDICAL_REQUEST_SQL: &str = "SELECT id, requester_name AS title, due_on AS due_date, NULL::uuid AS user_id
    FROM medical_requests
   WHERE practice_id = $1 AND deleted_at IS NULL
     AND status NOT IN ('completed', 'cancelled')
     AND due_on <= $2 + $3::int";

/// Outcome of a single reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent(usize),
    AlreadySent,
    /// Nobody to tell yet; the reminder is retried on the next pass
    NoRecipients,
}

impl ReminderSummary {
    pub fn record(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Sent(count) => self.notifications += count,
            Delivery::AlreadySent => self.already_sent += 1,
            Delivery::NoRecipients => self.no_recipients += 1,
        }
    }
}

/// One pass over every active practice. Each (kind, item, due date) is
/// reminded at most once, tracked in `reminder_deliveries`. A failing
/// practice or item is logged and the pass moves on.
pub async fn run(pool: &PgPool, config: &SchedulerConfig, today: NaiveDate) -> Result<ReminderSummary, DatabaseError> {
    let practices: Vec<(Uuid,)> =
        sqlx::query_as("SELECT id FROM practices WHERE is_active AND deleted_at IS NULL ORDER BY name")
            .fetch_all(pool)
            .await?;

    let mut summary = ReminderSummary { practices: practices.len(), ..Default::default() };
    for (practice_id,) in practices {
        if let Err(e) = remind_practice(pool, config, practice_id, today, &mut summary).await {
            tracing::error!("Reminders for practice {} failed: {}", practice_id, e);
            summary.failures += 1;
        }
    }

    tracing::info!(
        "Reminder pass: {} practices, {} notifications, {} already sent, {} without recipients, {} failures",
        summary.practices,
        summary.notifications,
        summary.already_sent,
        summary.no_recipients,
        summary.failures
    );
    Ok(summary)
}

async fn remind_practice(
    pool: &PgPool,
    config: &SchedulerConfig,
    practice_id: Uuid,
    today: NaiveDate,
    summary: &mut ReminderSummary,
) -> Result<(), DatabaseError> {
    let checks: [(&str, &str, i64); 4] = [
        (POLICY_REVIEW, POLICY_SQL, config.policy_review_lead_days),
        // tasks due tomorrow or already overdue
        (TASK_DUE, TASK_SQL, 1),
        (TRAINING_EXPIRY, TRAINING_SQL, config.training_expiry_lead_days),
        (MEDICAL_REQUEST_DUE, MEDICAL_REQUEST_SQL, config.medical_request_lead_days),
    ];

    for (kind, sql, lead_days) in checks {
        let items = sqlx::query_as::<_, DueItem>(sql)
            .bind(practice_id)
            .bind(today)
            .bind(lead_days as i32)
            .fetch_all(pool)
            .await?;

        for item in items {
            match deliver(pool, practice_id, kind, &item, today).await {
                Ok(delivery) => summary.record(delivery),
                Err(e) => {
                    tracing::error!("Reminder {} for {} failed: {}", kind, item.id, e);
                    summary.failures += 1;
                }
            }
        }
    }
    Ok(())
}

/// Claim the delivery and create the notifications in one transaction, so a
/// failed notification leaves the reminder unclaimed for the next pass.
pub async fn deliver(
    pool: &PgPool,
    practice_id: Uuid,
    kind: &str,
    item: &DueItem,
    today: NaiveDate,
) -> Result<Delivery, DatabaseError> {
    let mut tx = pool.begin().await?;
    if !claim_delivery(&mut *tx, practice_id, kind, item).await? {
        return Ok(Delivery::AlreadySent);
    }

    let (notification, recipient) = reminder_for(kind, item, today);
    let count = match recipient {
        Recipient::User(user_id) => {
            NotificationService::insert_for_user(&mut *tx, practice_id, user_id, &notification).await?;
            1
        }
        Recipient::AtLeast(role) => {
            NotificationService::insert_for_role(&mut *tx, practice_id, role, &notification)
                .await?
                .len()
        }
    };
    if count == 0 {
        tx.rollback().await?;
        return Ok(Delivery::NoRecipients);
    }

    tx.commit().await?;
    Ok(Delivery::Sent(count))
}

/// Record the delivery; false when this reminder was already sent
async fn claim_delivery<'e, E: PgExecutor<'e>>(
    executor: E,
    practice_id: Uuid,
    kind: &str,
    item: &DueItem,
) -> Result<bool, DatabaseError> {
    let claimed: Option<(Uuid,)> = sqlx::query_as(
        "INSERT INTO reminder_deliveries (practice_id, kind, entity_id, due_date)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (kind, entity_id, due_date) DO NOTHING
         RETURNING id",
    )
    .bind(practice_id)
    .bind(kind)
    .bind(item.id)
    .bind(item.due_date)
    .fetch_optional(executor)
    .await?;
    Ok(claimed.is_some())
}
