use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::ComplianceConfig;
use crate::database::manager::DatabaseError;
use crate::types::RagStatus;

pub const AREAS: [&str; 7] = [
    "tasks",
    "training",
    "fridges",
    "medical_requests",
    "incidents",
    "complaints",
    "policies",
];

/// Percentage score per compliance area for one period.
/// An area with nothing to measure is left empty rather than scored zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceScores {
    pub tasks: Option<f64>,
    pub training: Option<f64>,
    pub fridges: Option<f64>,
    pub medical_requests: Option<f64>,
    pub incidents: Option<f64>,
    pub complaints: Option<f64>,
    pub policies: Option<f64>,
    pub overall: Option<f64>,
}

impl ComplianceScores {
    pub fn area(&self, name: &str) -> Option<f64> {
        match name {
            "tasks" => self.tasks,
            "training" => self.training,
            "fridges" => self.fridges,
            "medical_requests" => self.medical_requests,
            "incidents" => self.incidents,
            "complaints" => self.complaints,
            "policies" => self.policies,
            "overall" => self.overall,
            _ => None,
        }
    }

    /// Mean of the areas that have a score
    pub fn compute_overall(&self) -> Option<f64> {
        let present: Vec<f64> = AREAS.iter().filter_map(|a| self.area(a)).collect();
        if present.is_empty() {
            return None;
        }
        Some(round1(present.iter().sum::<f64>() / present.len() as f64))
    }

    fn with_overall(mut self) -> Self {
        self.overall = self.compute_overall();
        self
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `numerator / denominator` as a percentage, None when nothing was measured
pub fn percentage(numerator: i64, denominator: i64) -> Option<f64> {
    if denominator <= 0 {
        return None;
    }
    Some(round1(numerator as f64 * 100.0 / denominator as f64))
}

pub fn rag_for_score(score: Option<f64>, thresholds: &ComplianceConfig) -> Option<RagStatus> {
    score.map(|s| {
        if s >= thresholds.green_threshold {
            RagStatus::Green
        } else if s >= thresholds.amber_threshold {
            RagStatus::Amber
        } else {
            RagStatus::Red
        }
    })
}

/// Window of equal length ending the day before `start`
pub fn preceding_window(start: NaiveDate, end: NaiveDate) -> (NaiveDate, NaiveDate) {
    let length = (end - start).num_days();
    let previous_end = start - Duration::days(1);
    (previous_end - Duration::days(length), previous_end)
}

/// SHA-256 of the serialized scores, lower-case hex
pub fn scores_checksum(scores: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(scores.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Improved,
    Declined,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaComparison {
    pub area: &'static str,
    pub baseline: Option<f64>,
    pub current: Option<f64>,
    /// Percentage points
    pub delta: Option<f64>,
    pub relative_change: Option<f64>,
    pub direction: Option<Direction>,
}

pub fn compare_area(area: &'static str, baseline: Option<f64>, current: Option<f64>) -> AreaComparison {
    let delta = match (baseline, current) {
        (Some(b), Some(c)) => Some(round1(c - b)),
        _ => None,
    };
    let relative_change = match (baseline, delta) {
        (Some(b), Some(d)) if b != 0.0 => Some(round1(d / b * 100.0)),
        _ => None,
    };
    let direction = delta.map(|d| {
        if d > 0.0 {
            Direction::Improved
        } else if d < 0.0 {
            Direction::Declined
        } else {
            Direction::Unchanged
        }
    });
    AreaComparison { area, baseline, current, delta, relative_change, direction }
}

/// Area-by-area comparison, overall last
pub fn compare(baseline: &ComplianceScores, current: &ComplianceScores) -> Vec<AreaComparison> {
    AREAS
        .iter()
        .copied()
        .chain(std::iter::once("overall"))
        .map(|area| compare_area(area, baseline.area(area), current.area(area)))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Baseline {
    pub id: Uuid,
    pub practice_id: Uuid,
    pub name: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub scores: Value,
    pub scores_checksum: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Baseline {
    const COLUMNS: &'static str =
        "id, practice_id, name, period_start, period_end, scores, scores_checksum, created_by, created_at";

    /// Scores as stored, provided they still match the checksum
    pub fn verified_scores(&self) -> Result<ComplianceScores, DatabaseError> {
        if scores_checksum(&self.scores) != self.scores_checksum {
            return Err(DatabaseError::Conflict(format!("baseline {} failed checksum verification", self.id)));
        }
        serde_json::from_value(self.scores.clone())
            .map_err(|e| DatabaseError::validation("scores", e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub baseline_period: (NaiveDate, NaiveDate),
    pub current_period: (NaiveDate, NaiveDate),
    pub baseline_id: Option<Uuid>,
    pub areas: Vec<AreaComparison>,
}

#[derive(Debug, FromRow)]
struct AreaCounts {
    tasks_done: i64,
    tasks_due: i64,
    training_valid: i64,
    training_total: i64,
    readings_ok: i64,
    readings_total: i64,
    requests_on_time: i64,
    requests_due: i64,
    incidents_resolved: i64,
    incidents_total: i64,
    complaints_on_time: i64,
    complaints_total: i64,
    policies_current: i64,
    policies_total: i64,
}

impl AreaCounts {
    fn scores(&self) -> ComplianceScores {
        ComplianceScores {
            tasks: percentage(self.tasks_done, self.tasks_due),
            training: percentage(self.training_valid, self.training_total),
            fridges: percentage(self.readings_ok, self.readings_total),
            medical_requests: percentage(self.requests_on_time, self.requests_due),
            incidents: percentage(self.incidents_resolved, self.incidents_total),
            complaints: percentage(self.complaints_on_time, self.complaints_total),
            policies: percentage(self.policies_current, self.policies_total),
            overall: None,
        }
        .with_overall()
    }
}

const AREA_COUNTS_SQL: &str = r#"
SELECT
    (SELECT COUNT(*) FROM tasks
      WHERE practice_id = $1 AND deleted_at IS NULL AND status <> 'cancelled'
        AND due_date BETWEEN $2 AND $3
        AND status = 'completed' AND completed_at::date <= due_date) AS tasks_done,
    (SELECT COUNT(*) FROM tasks
      WHERE practice_id = $1 AND deleted_at IS NULL AND status <> 'cancelled'
        AND due_date BETWEEN $2 AND $3) AS tasks_due,
    (SELECT COUNT(*) FROM training_records
      WHERE practice_id = $1 AND deleted_at IS NULL AND completed_on <= $3
        AND (expires_on IS NULL OR expires_on >= $3)) AS training_valid,
    (SELECT COUNT(*) FROM training_records
      WHERE practice_id = $1 AND deleted_at IS NULL AND completed_on <= $3) AS training_total,
    (SELECT COUNT(*) FROM fridge_temperature_logs
      WHERE practice_id = $1 AND recorded_at::date BETWEEN $2 AND $3 AND NOT out_of_range) AS readings_ok,
    (SELECT COUNT(*) FROM fridge_temperature_logs
      WHERE practice_id = $1 AND recorded_at::date BETWEEN $2 AND $3) AS readings_total,
    (SELECT COUNT(*) FROM medical_requests
      WHERE practice_id = $1 AND deleted_at IS NULL AND status <> 'cancelled'
        AND due_on BETWEEN $2 AND $3
        AND completed_on IS NOT NULL AND completed_on <= due_on) AS requests_on_time,
    (SELECT COUNT(*) FROM medical_requests
      WHERE practice_id = $1 AND deleted_at IS NULL AND status <> 'cancelled'
        AND due_on BETWEEN $2 AND $3) AS requests_due,
    (SELECT COUNT(*) FROM incidents
      WHERE practice_id = $1 AND deleted_at IS NULL AND occurred_at::date BETWEEN $2 AND $3
        AND status IN ('resolved', 'closed')) AS incidents_resolved,
    (SELECT COUNT(*) FROM incidents
      WHERE practice_id = $1 AND deleted_at IS NULL AND occurred_at::date BETWEEN $2 AND $3) AS incidents_total,
    (SELECT COUNT(*) FROM complaints
      WHERE practice_id = $1 AND deleted_at IS NULL AND received_on BETWEEN $2 AND $3
        AND responded_on IS NOT NULL AND responded_on <= response_due) AS complaints_on_time,
    (SELECT COUNT(*) FROM complaints
      WHERE practice_id = $1 AND deleted_at IS NULL AND received_on BETWEEN $2 AND $3) AS complaints_total,
    (SELECT COUNT(*) FROM policies
      WHERE practice_id = $1 AND deleted_at IS NULL AND status <> 'archived'
        AND status = 'approved' AND review_date >= $3) AS policies_current,
    (SELECT COUNT(*) FROM policies
      WHERE practice_id = $1 AND deleted_at IS NULL AND status <> 'archived') AS policies_total
"#;

pub struct ComplianceService {
    pool: PgPool,
}

impl ComplianceService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn scores(&self, practice_id: Uuid, start: NaiveDate, end: NaiveDate) -> Result<ComplianceScores, DatabaseError> {
        if start > end {
            return Err(DatabaseError::validation("start", "must not be after end"));
        }
        let counts = sqlx::query_as::<_, AreaCounts>(AREA_COUNTS_SQL)
            .bind(practice_id)
            .bind(start)
            .bind(end)
            .fetch_one(&self.pool)
            .await?;
        Ok(counts.scores())
    }

    /// Compute and store a snapshot of the period's scores
    pub async fn capture_baseline(
        &self,
        practice_id: Uuid,
        created_by: Option<Uuid>,
        name: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Baseline, DatabaseError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DatabaseError::validation("name", "must not be blank"));
        }
        let scores = self.scores(practice_id, start, end).await?;
        let scores = serde_json::to_value(&scores).map_err(|e| DatabaseError::validation("scores", e.to_string()))?;
        let checksum = scores_checksum(&scores);

        let query = format!(
            "INSERT INTO compliance_baselines (practice_id, name, period_start, period_end, scores, scores_checksum, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            Baseline::COLUMNS
        );
        let baseline = sqlx::query_as::<_, Baseline>(&query)
            .bind(practice_id)
            .bind(name)
            .bind(start)
            .bind(end)
            .bind(&scores)
            .bind(&checksum)
            .bind(created_by)
            .fetch_one(&self.pool)
            .await?;
        tracing::info!("Captured compliance baseline '{}' for practice {} ({} to {})", name, practice_id, start, end);
        Ok(baseline)
    }

    pub async fn list_baselines(&self, practice_id: Uuid) -> Result<Vec<Baseline>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM compliance_baselines WHERE practice_id = $1 ORDER BY period_end DESC, created_at DESC",
            Baseline::COLUMNS
        );
        Ok(sqlx::query_as::<_, Baseline>(&query).bind(practice_id).fetch_all(&self.pool).await?)
    }

    pub async fn get_baseline(&self, practice_id: Uuid, id: Uuid) -> Result<Baseline, DatabaseError> {
        let query = format!(
            "SELECT {} FROM compliance_baselines WHERE id = $1 AND practice_id = $2",
            Baseline::COLUMNS
        );
        sqlx::query_as::<_, Baseline>(&query)
            .bind(id)
            .bind(practice_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("baseline {} not found", id)))
    }

    /// Compare the current window with a stored baseline, or with the
    /// preceding window of equal length when no baseline is named
    pub async fn compare(
        &self,
        practice_id: Uuid,
        baseline_id: Option<Uuid>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Comparison, DatabaseError> {
        let current = self.scores(practice_id, start, end).await?;
        let (baseline_scores, baseline_period) = match baseline_id {
            Some(id) => {
                let stored = self.get_baseline(practice_id, id).await?;
                (stored.verified_scores()?, (stored.period_start, stored.period_end))
            }
            None => {
                let (b_start, b_end) = preceding_window(start, end);
                (self.scores(practice_id, b_start, b_end).await?, (b_start, b_end))
            }
        };
        Ok(Comparison {
            baseline_period,
            current_period: (start, end),
            baseline_id,
            areas: compare(&baseline_scores, &current),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn empty_areas_are_not_scored() {
        assert_eq!(percentage(0, 0), None);
        assert_eq!(percentage(2, 3), Some(66.7));
        assert_eq!(percentage(5, 5), Some(100.0));
    }

    #[test]
    fn overall_is_mean_of_present_areas() {
        let scores = ComplianceScores { tasks: Some(80.0), training: Some(100.0), ..Default::default() };
        assert_eq!(scores.compute_overall(), Some(90.0));
        assert_eq!(ComplianceScores::default().compute_overall(), None);
    }

    #[test]
    fn rag_thresholds() {
        let config = crate::config::AppConfig::development().compliance;
        assert_eq!(rag_for_score(Some(90.0), &config), Some(RagStatus::Green));
        assert_eq!(rag_for_score(Some(75.0), &config), Some(RagStatus::Amber));
        assert_eq!(rag_for_score(Some(74.9), &config), Some(RagStatus::Red));
        assert_eq!(rag_for_score(None, &config), None);
    }

    #[test]
    fn comparison_reports_points_and_relative_change() {
        let c = compare_area("tasks", Some(80.0), Some(90.0));
        assert_eq!(c.delta, Some(10.0));
        assert_eq!(c.relative_change, Some(12.5));
        assert_eq!(c.direction, Some(Direction::Improved));

        let c = compare_area("fridges", Some(0.0), Some(50.0));
        assert_eq!(c.delta, Some(50.0));
        assert_eq!(c.relative_change, None);

        let c = compare_area("incidents", None, Some(50.0));
        assert_eq!(c.delta, None);
        assert_eq!(c.direction, None);

        assert_eq!(compare_area("policies", Some(60.0), Some(60.0)).direction, Some(Direction::Unchanged));
    }

    #[test]
    fn compare_covers_every_area_and_overall() {
        let rows = compare(&ComplianceScores::default(), &ComplianceScores::default());
        assert_eq!(rows.len(), AREAS.len() + 1);
        assert_eq!(rows.last().unwrap().area, "overall");
    }

    #[test]
    fn preceding_window_has_equal_length() {
        assert_eq!(preceding_window(d(2024, 6, 1), d(2024, 6, 30)), (d(2024, 5, 2), d(2024, 5, 31)));
        assert_eq!(preceding_window(d(2024, 6, 10), d(2024, 6, 10)), (d(2024, 6, 9), d(2024, 6, 9)));
    }

    #[test]
    fn checksum_detects_tampering() {
        let scores = serde_json::to_value(ComplianceScores { tasks: Some(80.0), ..Default::default() }).unwrap();
        let baseline = Baseline {
            id: Uuid::new_v4(),
            practice_id: Uuid::new_v4(),
            name: "Q1".into(),
            period_start: d(2024, 1, 1),
            period_end: d(2024, 3, 31),
            scores_checksum: scores_checksum(&scores),
            scores,
            created_by: None,
            created_at: Utc::now(),
        };
        assert_eq!(baseline.verified_scores().unwrap().tasks, Some(80.0));

        let mut tampered = baseline.clone();
        tampered.scores["tasks"] = serde_json::json!(99.0);
        assert!(tampered.verified_scores().is_err());
    }
}
