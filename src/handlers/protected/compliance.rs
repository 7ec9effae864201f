use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::config::{self, ComplianceConfig};
use crate::database::entity::DATE_YEARS;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, PracticeScope};
use crate::observer::today;
use crate::services::compliance_service::{rag_for_score, Baseline, Comparison, ComplianceScores, ComplianceService, AREAS};
use crate::types::{window_start, Role};

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Fill in a missing window: `end` defaults to today and `start` to
/// `window_days` inclusive days ending at `end`
pub fn resolve_period(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
    window_days: i64,
) -> Result<(NaiveDate, NaiveDate), ApiError> {
    for (field, date) in [("start", start), ("end", end)] {
        if date.is_some_and(|d| !DATE_YEARS.contains(&d.year())) {
            return Err(ApiError::field_error(
                field,
                format!("date must be between {} and {}", DATE_YEARS.start(), DATE_YEARS.end()),
            ));
        }
    }
    let end = end.unwrap_or(today);
    let start = match start {
        Some(start) => start,
        None => window_start(end, window_days).ok_or_else(|| ApiError::field_error("start", "date is out of range"))?,
    };
    if start > end {
        return Err(ApiError::field_error("start", "must not be after end"));
    }
    Ok((start, end))
}

/// Scores with a RAG rating per area, missing areas rated as null
pub fn scores_with_rag(scores: &ComplianceScores, thresholds: &ComplianceConfig) -> Value {
    let rag: Map<String, Value> = AREAS
        .iter()
        .chain(std::iter::once(&"overall"))
        .map(|area| (area.to_string(), json!(rag_for_score(scores.area(area), thresholds))))
        .collect();
    json!({ "scores": scores, "rag": rag })
}

/// GET /api/compliance/scores?start=&end=
pub async fn scores(Extension(scope): Extension<PracticeScope>, Query(period): Query<PeriodQuery>) -> ApiResult<Value> {
    let config = config::config();
    let (start, end) = resolve_period(period.start, period.end, today(), config.compliance.default_window_days)?;
    let scores = ComplianceService::new(DatabaseManager::pool()?)
        .scores(scope.practice_id, start, end)
        .await?;

    let mut data = scores_with_rag(&scores, &config.compliance);
    data["period"] = json!({ "start": start, "end": end });
    Ok(ApiResponse::success(data))
}

#[derive(Debug, Deserialize)]
pub struct NewBaseline {
    pub name: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// POST /api/compliance/baselines
pub async fn create_baseline(
    Extension(scope): Extension<PracticeScope>,
    Json(body): Json<NewBaseline>,
) -> ApiResult<Baseline> {
    scope.require(Role::Manager)?;
    let (start, end) = resolve_period(body.start, body.end, today(), config::config().compliance.default_window_days)?;
    let baseline = ComplianceService::new(DatabaseManager::pool()?)
        .capture_baseline(scope.practice_id, Some(scope.user_id), &body.name, start, end)
        .await?;
    tracing::info!("Captured compliance baseline '{}' for {}", baseline.name, scope.practice_id);
    Ok(ApiResponse::created(baseline))
}

/// GET /api/compliance/baselines
pub async fn list_baselines(Extension(scope): Extension<PracticeScope>) -> ApiResult<Vec<Baseline>> {
    let baselines = ComplianceService::new(DatabaseManager::pool()?)
        .list_baselines(scope.practice_id)
        .await?;
    Ok(ApiResponse::success(baselines))
}

/// GET /api/compliance/baselines/:id
pub async fn get_baseline(Extension(scope): Extension<PracticeScope>, Path(id): Path<Uuid>) -> ApiResult<Baseline> {
    let baseline = ComplianceService::new(DatabaseManager::pool()?)
        .get_baseline(scope.practice_id, id)
        .await?;
    Ok(ApiResponse::success(baseline))
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub baseline_id: Option<Uuid>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// GET /api/compliance/compare?baseline_id=&start=&end=
pub async fn compare(
    Extension(scope): Extension<PracticeScope>,
    Query(query): Query<CompareQuery>,
) -> ApiResult<Comparison> {
    let (start, end) = resolve_period(query.start, query.end, today(), config::config().compliance.default_window_days)?;
    let comparison = ComplianceService::new(DatabaseManager::pool()?)
        .compare(scope.practice_id, query.baseline_id, start, end)
        .await?;
    Ok(ApiResponse::success(comparison))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn default_period_is_the_window_ending_today() {
        assert_eq!(resolve_period(None, None, d(6, 30), 30).unwrap(), (d(6, 1), d(6, 30)));
        assert_eq!(resolve_period(Some(d(3, 1)), Some(d(3, 31)), d(6, 30), 30).unwrap(), (d(3, 1), d(3, 31)));
        assert_eq!(resolve_period(None, Some(d(2, 10)), d(6, 30), 10).unwrap(), (d(2, 1), d(2, 10)));
    }

    #[test]
    fn inverted_period_is_rejected() {
        assert!(matches!(
            resolve_period(Some(d(5, 2)), Some(d(5, 1)), d(6, 30), 30),
            Err(ApiError::ValidationError { .. })
        ));
    }

    #[test]
    fn dates_outside_the_calendar_are_rejected() {
        let far = NaiveDate::from_ymd_opt(10000, 1, 1).unwrap();
        let early = NaiveDate::from_ymd_opt(1800, 1, 1).unwrap();
        assert!(matches!(
            resolve_period(None, Some(far), d(6, 30), 30),
            Err(ApiError::ValidationError { .. })
        ));
        assert!(matches!(
            resolve_period(Some(early), None, d(6, 30), 30),
            Err(ApiError::ValidationError { .. })
        ));
        assert!(matches!(
            resolve_period(None, Some(NaiveDate::MIN), d(6, 30), 30),
            Err(ApiError::ValidationError { .. })
        ));
    }

    #[test]
    fn rag_is_rated_per_area() {
        let config = config::AppConfig::development().compliance;
        let scores = ComplianceScores { tasks: Some(95.0), fridges: Some(80.0), incidents: Some(50.0), ..Default::default() };
        let value = scores_with_rag(&scores, &config);
        assert_eq!(value["rag"]["tasks"], json!("green"));
        assert_eq!(value["rag"]["fridges"], json!("amber"));
        assert_eq!(value["rag"]["incidents"], json!("red"));
        assert_eq!(value["rag"]["training"], Value::Null);
        assert_eq!(value["scores"]["tasks"], json!(95.0));
    }
}
