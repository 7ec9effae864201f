use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;

/// Turnaround statistics for one request type
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct RequestTypeStats {
    pub request_type: String,
    pub total: i64,
    pub completed: i64,
    pub completed_within_target: i64,
    pub overdue_open: i64,
    pub average_turnaround_days: Option<f64>,
    #[sqlx(skip)]
    pub within_target_percentage: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MedicalRequestReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub by_type: Vec<RequestTypeStats>,
}

/// Share of completed requests that met their target, one decimal place
pub fn within_target_percentage(completed: i64, within_target: i64) -> Option<f64> {
    if completed == 0 {
        return None;
    }
    Some((within_target as f64 * 1000.0 / completed as f64).round() / 10.0)
}

pub struct MedicalRequestService {
    pool: PgPool,
}

impl MedicalRequestService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Requests received in `[from, to]`, grouped by type.
    /// Turnaround is `completed_on - received_on` in days.
    pub async fn report(
        &self,
        practice_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        today: NaiveDate,
    ) -> Result<MedicalRequestReport, DatabaseError> {
        if from > to {
            return Err(DatabaseError::validation("from", "must not be after to"));
        }
        let mut by_type = sqlx::query_as::<_, RequestTypeStats>(
            "SELECT request_type,
                    COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE completed_on IS NOT NULL) AS completed,
                    COUNT(*) FILTER (WHERE completed_on IS NOT NULL AND due_on IS NOT NULL
                                       AND completed_on <= due_on) AS completed_within_target,
                    COUNT(*) FILTER (WHERE completed_on IS NULL AND status <> 'cancelled'
                                       AND due_on < $4) AS overdue_open,
                    ROUND(AVG(completed_on - received_on)
                          FILTER (WHERE completed_on IS NOT NULL), 1)::float8 AS average_turnaround_days
               FROM medical_requests
              WHERE practice_id = $1 AND deleted_at IS NULL
                AND received_on BETWEEN $2 AND $3
              GROUP BY request_type
              ORDER BY request_type",
        )
        .bind(practice_id)
        .bind(from)
        .bind(to)
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        for stats in &mut by_type {
            stats.within_target_percentage = within_target_percentage(stats.completed, stats.completed_within_target);
        }
        Ok(MedicalRequestReport { from, to, by_type })
    }
}
