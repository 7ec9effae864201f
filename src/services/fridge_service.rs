use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::Fridge;
use crate::types::RagStatus;

/// Latest reading per active fridge
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FridgeStatus {
    pub fridge_id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub min_temp: Decimal,
    pub max_temp: Decimal,
    pub latest_temp: Option<Decimal>,
    pub latest_recorded_at: Option<DateTime<Utc>>,
    pub latest_out_of_range: Option<bool>,
    #[sqlx(skip)]
    pub rag: Option<RagStatus>,
}

/// Out-of-range latest reading is red; no reading today is amber.
pub fn fridge_rag(latest_out_of_range: Option<bool>, latest_recorded_on: Option<NaiveDate>, today: NaiveDate) -> RagStatus {
    match (latest_out_of_range, latest_recorded_on) {
        (Some(true), _) => RagStatus::Red,
        (_, Some(day)) if day >= today => RagStatus::Green,
        _ => RagStatus::Amber,
    }
}

pub struct FridgeService {
    pool: PgPool,
}

impl FridgeService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, practice_id: Uuid, id: Uuid) -> Result<Option<Fridge>, DatabaseError> {
        let fridge = sqlx::query_as::<_, Fridge>(
            "SELECT id, practice_id, name, min_temp, max_temp, is_active
               FROM fridges
              WHERE id = $1 AND practice_id = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(practice_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(fridge)
    }

    /// Readings for one fridge, newest first, optionally bounded by date
    pub async fn logs(
        &self,
        practice_id: Uuid,
        fridge_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Value>, DatabaseError> {
        let rows: Vec<(Value,)> = sqlx::query_as(
            "SELECT to_jsonb(l) AS record
               FROM fridge_temperature_logs l
              WHERE l.practice_id = $1
                AND l.fridge_id = $2
                AND ($3::date IS NULL OR l.recorded_at >= $3::date)
                AND ($4::date IS NULL OR l.recorded_at < $4::date + 1)
              ORDER BY l.recorded_at DESC
              LIMIT 1000",
        )
        .bind(practice_id)
        .bind(fridge_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(record,)| record).collect())
    }

    pub async fn statuses(&self, practice_id: Uuid, today: NaiveDate) -> Result<Vec<FridgeStatus>, DatabaseError> {
        let mut statuses = sqlx::query_as::<_, FridgeStatus>(
            "SELECT f.id AS fridge_id, f.name, f.location, f.min_temp, f.max_temp,
                    l.current_temp AS latest_temp,
                    l.recorded_at AS latest_recorded_at,
                    l.out_of_range AS latest_out_of_range
               FROM fridges f
               LEFT JOIN LATERAL (
                    SELECT current_temp, recorded_at, out_of_range
                      FROM fridge_temperature_logs
                     WHERE fridge_id = f.id
                     ORDER BY recorded_at DESC
                     LIMIT 1
               ) l ON true
              WHERE f.practice_id = $1 AND f.is_active AND f.deleted_at IS NULL
              ORDER BY f.name",
        )
        .bind(practice_id)
        .fetch_all(&self.pool)
        .await?;

        for status in &mut statuses {
            let recorded_on = status.latest_recorded_at.map(|t| t.date_naive());
            status.rag = Some(fridge_rag(status.latest_out_of_range, recorded_on, today));
        }
        Ok(statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn rag_from_latest_reading() {
        assert_eq!(fridge_rag(Some(true), Some(day(10)), day(10)), RagStatus::Red);
        assert_eq!(fridge_rag(Some(false), Some(day(10)), day(10)), RagStatus::Green);
        assert_eq!(fridge_rag(Some(false), Some(day(9)), day(10)), RagStatus::Amber);
        assert_eq!(fridge_rag(None, None, day(10)), RagStatus::Amber);
    }
}
