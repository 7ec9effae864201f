use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::database::manager::DatabaseError;
use crate::services::fridge_service::FridgeService;
use crate::types::RagStatus;

/// Red when anything is already late, amber when something is coming due
pub fn rag_from_counts(red: i64, amber: i64) -> RagStatus {
    if red > 0 {
        RagStatus::Red
    } else if amber > 0 {
        RagStatus::Amber
    } else {
        RagStatus::Green
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardArea {
    /// Items needing attention now
    pub count: i64,
    /// Items that will need attention soon
    pub upcoming: i64,
    pub rag: RagStatus,
}

impl DashboardArea {
    fn new(count: i64, upcoming: i64) -> Self {
        Self { count, upcoming, rag: rag_from_counts(count, upcoming) }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub today: NaiveDate,
    pub overdue_tasks: DashboardArea,
    pub open_incidents: DashboardArea,
    pub open_complaints: DashboardArea,
    pub policies_due_for_review: DashboardArea,
    pub expiring_training: DashboardArea,
    pub fridges_out_of_range: DashboardArea,
    pub overdue_medical_requests: DashboardArea,
    pub unread_notifications: i64,
    pub overall: RagStatus,
}

#[derive(Debug, FromRow)]
struct DashboardCounts {
    tasks_overdue: i64,
    tasks_due_soon: i64,
    incidents_serious: i64,
    incidents_open: i64,
    complaints_late: i64,
    complaints_open: i64,
    policies_overdue: i64,
    policies_due_soon: i64,
    training_expired: i64,
    training_expiring: i64,
    requests_overdue: i64,
    requests_due_soon: i64,
    unread_notifications: i64,
}

const DASHBOARD_SQL: &str = r#"
SELECT
    (SELECT COUNT(*) FROM tasks WHERE practice_id = $1 AND deleted_at IS NULL
        AND status NOT IN ('completed', 'cancelled') AND due_date < $2) AS tasks_overdue,
    (SELECT COUNT(*) FROM tasks WHERE practice_id = $1 AND deleted_at IS NULL
        AND status NOT IN ('completed', 'cancelled') AND due_date BETWEEN $2 AND $2 + $3::int) AS tasks_due_soon,
    (SELECT COUNT(*) FROM incidents WHERE practice_id = $1 AND deleted_at IS NULL
        AND status IN ('open', 'investigating') AND severity IN ('high', 'critical')) AS incidents_serious,
    (SELECT COUNT(*) FROM incidents WHERE practice_id = $1 AND deleted_at IS NULL
        AND status IN ('open', 'investigating') AND severity NOT IN ('high', 'critical')) AS incidents_open,
    (SELECT COUNT(*) FROM complaints WHERE practice_id = $1 AND deleted_at IS NULL
        AND status NOT IN ('responded', 'closed')
        AND (response_due < $2 OR (acknowledged_on IS NULL AND acknowledgement_due < $2))) AS complaints_late,
    (SELECT COUNT(*) FROM complaints WHERE practice_id = $1 AND deleted_at IS NULL
        AND status NOT IN ('responded', 'closed')
        AND NOT (response_due < $2 OR (acknowledged_on IS NULL AND acknowledgement_due < $2))) AS complaints_open,
    (SELECT COUNT(*) FROM policies WHERE practice_id = $1 AND deleted_at IS NULL
        AND status <> 'archived' AND review_date < $2) AS policies_overdue,
    (SELECT COUNT(*) FROM policies WHERE practice_id = $1 AND deleted_at IS NULL
        AND status <> 'archived' AND review_date BETWEEN $2 AND $2 + $4::int) AS policies_due_soon,
    (SELECT COUNT(*) FROM training_records WHERE practice_id = $1 AND deleted_at IS NULL
        AND expires_on < $2) AS training_expired,
    (SELECT COUNT(*) FROM training_records WHERE practice_id = $1 AND deleted_at IS NULL
        AND expires_on BETWEEN $2 AND $2 + $5::int) AS training_expiring,
    (SELECT COUNT(*) FROM medical_requests WHERE practice_id = $1 AND deleted_at IS NULL
        AND status NOT IN ('completed', 'cancelled') AND due_on < $2) AS requests_overdue,
    (SELECT COUNT(*) FROM medical_requests WHERE practice_id = $1 AND deleted_at IS NULL
        AND status NOT IN ('completed', 'cancelled') AND due_on BETWEEN $2 AND $2 + $6::int) AS requests_due_soon,
    (SELECT COUNT(*) FROM notifications WHERE user_id = $7 AND is_read = false) AS unread_notifications
"#;

pub struct DashboardService {
    pool: PgPool,
}

impl DashboardService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn summary(
        &self,
        practice_id: Uuid,
        user_id: Uuid,
        today: NaiveDate,
        config: &AppConfig,
    ) -> Result<Dashboard, DatabaseError> {
        let counts = sqlx::query_as::<_, DashboardCounts>(DASHBOARD_SQL)
            .bind(practice_id)
            .bind(today)
            .bind(config.compliance.task_amber_days as i32)
            .bind(config.scheduler.policy_review_lead_days as i32)
            .bind(config.scheduler.training_expiry_lead_days as i32)
            .bind(config.scheduler.medical_request_lead_days as i32)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let fridges = FridgeService::new(self.pool.clone()).statuses(practice_id, today).await?;
        let fridges_red = fridges.iter().filter(|f| f.rag == Some(RagStatus::Red)).count() as i64;
        let fridges_amber = fridges.iter().filter(|f| f.rag == Some(RagStatus::Amber)).count() as i64;

        let areas = [
            DashboardArea::new(counts.tasks_overdue, counts.tasks_due_soon),
            DashboardArea::new(counts.incidents_serious, counts.incidents_open),
            DashboardArea::new(counts.complaints_late, counts.complaints_open),
            DashboardArea::new(counts.policies_overdue, counts.policies_due_soon),
            DashboardArea::new(counts.training_expired, counts.training_expiring),
            DashboardArea::new(fridges_red, fridges_amber),
            DashboardArea::new(counts.requests_overdue, counts.requests_due_soon),
        ];
        let overall = areas.iter().fold(RagStatus::Green, |acc, a| acc.worst(a.rag));
        let [overdue_tasks, open_incidents, open_complaints, policies_due_for_review, expiring_training, fridges_out_of_range, overdue_medical_requests] =
            areas;

        Ok(Dashboard {
            today,
            overdue_tasks,
            open_incidents,
            open_complaints,
            policies_due_for_review,
            expiring_training,
            fridges_out_of_range,
            overdue_medical_requests,
            unread_notifications: counts.unread_notifications,
            overall,
        })
    }
}
