use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Daily labor metric row. Maps to `wms_labor_daily_metrics`, unique on
/// (operator_id, metric_date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LaborDailyMetric {
    pub id: i64,
    pub operator_id: Uuid,
    pub metric_date: NaiveDate,
    pub tasks_completed: i32,
    pub units_processed: i64,
    pub avg_task_time_seconds: f64,
    pub utilization_percent: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metric values computed by the aggregator for one operator and date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaborMetricRow {
    pub operator_id: Uuid,
    pub metric_date: NaiveDate,
    pub tasks_completed: i32,
    pub units_processed: i64,
    pub avg_task_time_seconds: f64,
    pub utilization_percent: f64,
}

impl LaborDailyMetric {
    /// Upsert one row per (operator, date). Returns the stored row plus
    /// whether it was inserted (`xmax = 0`) rather than updated.
    pub async fn upsert<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        row: &LaborMetricRow,
    ) -> Result<(LaborDailyMetric, bool), sqlx::Error> {
        #[derive(FromRow)]
        struct UpsertRow {
            #[sqlx(flatten)]
            metric: LaborDailyMetric,
            inserted: bool,
        }

        let result = sqlx::query_as::<_, UpsertRow>(
            "INSERT INTO wms_labor_daily_metrics \
             (operator_id, metric_date, tasks_completed, units_processed, \
              avg_task_time_seconds, utilization_percent) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (operator_id, metric_date) DO UPDATE SET \
                 tasks_completed = EXCLUDED.tasks_completed, \
                 units_processed = EXCLUDED.units_processed, \
                 avg_task_time_seconds = EXCLUDED.avg_task_time_seconds, \
                 utilization_percent = EXCLUDED.utilization_percent, \
                 updated_at = NOW() \
             RETURNING id, operator_id, metric_date, tasks_completed, units_processed, \
                       avg_task_time_seconds, utilization_percent, created_at, updated_at, \
                       (xmax = 0) AS inserted",
        )
        .bind(row.operator_id)
        .bind(row.metric_date)
        .bind(row.tasks_completed)
        .bind(row.units_processed)
        .bind(row.avg_task_time_seconds)
        .bind(row.utilization_percent)
        .fetch_one(executor)
        .await?;

        Ok((result.metric, result.inserted))
    }

    pub async fn list_for_date(
        pool: &PgPool,
        date: NaiveDate,
        page: i64,
        limit: i64,
    ) -> Result<Vec<LaborDailyMetric>, sqlx::Error> {
        sqlx::query_as::<_, LaborDailyMetric>(
            "SELECT id, operator_id, metric_date, tasks_completed, units_processed, \
                    avg_task_time_seconds, utilization_percent, created_at, updated_at \
             FROM wms_labor_daily_metrics \
             WHERE metric_date = $1 \
             ORDER BY tasks_completed DESC, operator_id ASC \
             LIMIT $2 OFFSET $3",
        )
        .bind(date)
        .bind(limit)
        .bind((page - 1) * limit)
        .fetch_all(pool)
        .await
    }

    /// Averages across all operators for one date, for the labor overview.
    pub async fn averages_for_date(
        pool: &PgPool,
        date: NaiveDate,
    ) -> Result<(f64, f64, i64), sqlx::Error> {
        let (avg_time, avg_utilization, total_completed): (Option<f64>, Option<f64>, Option<i64>) =
            sqlx::query_as(
                "SELECT AVG(avg_task_time_seconds), AVG(utilization_percent), \
                        SUM(tasks_completed)::BIGINT \
                 FROM wms_labor_daily_metrics WHERE metric_date = $1",
            )
            .bind(date)
            .fetch_one(pool)
            .await?;
        Ok((
            avg_time.unwrap_or(0.0),
            avg_utilization.unwrap_or(0.0),
            total_completed.unwrap_or(0),
        ))
    }
}
