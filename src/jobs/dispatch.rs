use futures::stream::{self, StreamExt};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::jobs::mailer::{render_notification, Mailer, OutgoingEmail};

const CONCURRENT_SENDS: usize = 4;

/// A notification waiting to be emailed
#[derive(Debug, Clone, FromRow)]
pub struct PendingEmail {
    pub id: Uuid,
    pub email: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

impl PendingEmail {
    pub fn to_email(&self, app_base_url: &str) -> OutgoingEmail {
        OutgoingEmail {
            to: self.email.clone(),
            subject: self.title.clone(),
            html: render_notification(&self.title, &self.message, self.link.as_deref(), app_base_url),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchSummary {
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Send each pending email, returning the ids that were delivered.
/// Failures are logged and left for the next pass.
pub async fn send_all(mailer: Arc<dyn Mailer>, pending: Vec<PendingEmail>, app_base_url: &str) -> Vec<Uuid> {
    let emails: Vec<(PendingEmail, OutgoingEmail)> = pending
        .into_iter()
        .map(|item| {
            let email = item.to_email(app_base_url);
            (item, email)
        })
        .collect();

    stream::iter(emails)
        .map(|(item, email)| {
            let mailer = Arc::clone(&mailer);
            async move {
                match mailer.send(&email).await {
                    Ok(()) => Some(item.id),
                    Err(e) => {
                        tracing::warn!("Email for notification {} to {} failed: {}", item.id, item.email, e);
                        None
                    }
                }
            }
        })
        .buffer_unordered(CONCURRENT_SENDS)
        .filter_map(|sent| async move { sent })
        .collect()
        .await
}

/// Email high-priority and reminder notifications that have not been sent yet
pub async fn run(pool: &PgPool, mailer: Arc<dyn Mailer>, app_base_url: &str, batch_size: i64) -> Result<DispatchSummary, DatabaseError> {
    let pending = sqlx::query_as::<_, PendingEmail>(
        "SELECT n.id, u.email, n.title, n.message, n.link
           FROM notifications n
           JOIN users u ON u.id = n.user_id
          WHERE n.email_sent_at IS NULL
            AND (n.priority = 'high' OR n.kind = 'reminder')
            AND u.is_active AND u.deleted_at IS NULL
          ORDER BY n.created_at
          LIMIT $1",
    )
    .bind(batch_size)
    .fetch_all(pool)
    .await?;

    let pending_count = pending.len();
    let sent = send_all(mailer, pending, app_base_url).await;
    if !sent.is_empty() {
        sqlx::query("UPDATE notifications SET email_sent_at = now(), updated_at = now() WHERE id = ANY($1)")
            .bind(&sent)
            .execute(pool)
            .await?;
    }

    let summary = DispatchSummary { pending: pending_count, sent: sent.len(), failed: pending_count - sent.len() };
    tracing::info!("Email dispatch: {} pending, {} sent, {} failed", summary.pending, summary.sent, summary.failed);
    Ok(summary)
}
