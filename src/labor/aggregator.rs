//! Scheduled daily aggregation of per-operator labor metrics.

use crate::config::MetricsConfig;
use crate::error::{Result, WmsError};
use crate::labor::shift::{parse_shift_time, shift_duration_seconds, utilization_percent};
use crate::models::{LaborDailyMetric, LaborMetricRow, Operator};
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Statistics for one aggregation cycle.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsCycleStats {
    pub date: NaiveDate,
    pub operators_processed: usize,
    pub inserted_count: usize,
    pub updated_count: usize,
    pub total_tasks_completed: i64,
    pub total_units_processed: i64,
    pub average_task_time_seconds: f64,
    pub average_utilization_percent: f64,
}

/// Per-operator completed-task statistics for one day.
#[derive(Debug, FromRow)]
struct CompletedTaskStats {
    tasks_completed: i64,
    total_active_seconds: i64,
    avg_task_time_seconds: f64,
}

#[derive(Clone)]
pub struct LaborMetricsAggregator {
    pool: PgPool,
    config: MetricsConfig,
}

impl LaborMetricsAggregator {
    pub fn new(pool: PgPool, config: MetricsConfig) -> Self {
        Self { pool, config }
    }

    /// Start the daily schedule: compute the next run instant from local
    /// wall-clock time (advancing 24 h when past), sleep, run, reschedule.
    /// Shutdown cancels the pending sleep; an in-flight cycle completes
    /// before the task exits.
    pub fn start(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let aggregator = self.clone();
        tokio::spawn(async move {
            info!(
                run_hour = aggregator.config.run_hour,
                run_minute = aggregator.config.run_minute,
                run_on_startup = aggregator.config.run_on_startup,
                "Labor metrics aggregator started"
            );

            if aggregator.config.run_on_startup {
                aggregator.run_and_log(Local::now().date_naive()).await;
            }

            loop {
                let sleep_duration = aggregator.duration_until_next_run(Local::now());
                tokio::select! {
                    _ = tokio::time::sleep(sleep_duration) => {
                        aggregator.run_and_log(Local::now().date_naive()).await;
                    }
                    _ = shutdown.changed() => {
                        break;
                    }
                }
            }

            info!("Labor metrics aggregator stopped");
        })
    }

    fn duration_until_next_run(&self, now: DateTime<Local>) -> std::time::Duration {
        let run_time = NaiveTime::from_hms_opt(self.config.run_hour, self.config.run_minute, 0)
            .unwrap_or_else(|| NaiveTime::from_hms_opt(23, 59, 0).unwrap());

        let mut next = now.date_naive().and_time(run_time);
        if Local
            .from_local_datetime(&next)
            .earliest()
            .map(|candidate| candidate <= now)
            .unwrap_or(true)
        {
            next = next + ChronoDuration::hours(24);
        }

        let next_instant = Local
            .from_local_datetime(&next)
            .earliest()
            .unwrap_or_else(|| now + ChronoDuration::hours(24));

        (next_instant - now)
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(60))
    }

    async fn run_and_log(&self, date: NaiveDate) {
        match self.run_for_date(date).await {
            Ok(stats) => {
                info!(
                    date = %stats.date,
                    operators_processed = stats.operators_processed,
                    inserted = stats.inserted_count,
                    updated = stats.updated_count,
                    total_tasks_completed = stats.total_tasks_completed,
                    total_units_processed = stats.total_units_processed,
                    average_task_time_seconds = stats.average_task_time_seconds,
                    average_utilization_percent = stats.average_utilization_percent,
                    "Labor metrics cycle complete"
                );
            }
            Err(e) => {
                error!(date = %date, error = %e, "Labor metrics cycle failed");
            }
        }
    }

    /// Aggregate one date: per-operator completed-task stats over
    /// `[D, D+1)`, shift-normalized utilization, one upsert per operator.
    pub async fn run_for_date(&self, date: NaiveDate) -> Result<MetricsCycleStats> {
        let (day_start, day_end) = day_bounds(date)?;

        let mut tx = self.pool.begin().await?;

        let operators = Operator::load_all(&mut *tx).await?;

        let mut stats = MetricsCycleStats {
            date,
            operators_processed: 0,
            inserted_count: 0,
            updated_count: 0,
            total_tasks_completed: 0,
            total_units_processed: 0,
            average_task_time_seconds: 0.0,
            average_utilization_percent: 0.0,
        };
        let mut total_active_seconds: i64 = 0;
        let mut utilization_sum = 0.0;

        for operator in &operators {
            let completed = completed_task_stats(&mut *tx, operator.id, day_start, day_end).await?;
            let units = units_processed(&mut *tx, operator.id, day_start, day_end).await?;

            let shift_seconds = match (
                parse_shift_time(&operator.shift_start),
                parse_shift_time(&operator.shift_end),
            ) {
                (Ok(start), Ok(end)) => shift_duration_seconds(start, end),
                (start, end) => {
                    warn!(
                        operator_id = %operator.id,
                        shift_start = %operator.shift_start,
                        shift_end = %operator.shift_end,
                        error = ?start.err().or(end.err()),
                        "Unparseable shift window, utilization recorded as 0"
                    );
                    0
                }
            };

            let utilization =
                utilization_percent(completed.total_active_seconds, shift_seconds);

            let (_, inserted) = LaborDailyMetric::upsert(
                &mut *tx,
                &LaborMetricRow {
                    operator_id: operator.id,
                    metric_date: date,
                    tasks_completed: completed.tasks_completed as i32,
                    units_processed: units,
                    avg_task_time_seconds: completed.avg_task_time_seconds,
                    utilization_percent: utilization,
                },
            )
            .await?;

            stats.operators_processed += 1;
            if inserted {
                stats.inserted_count += 1;
            } else {
                stats.updated_count += 1;
            }
            stats.total_tasks_completed += completed.tasks_completed;
            stats.total_units_processed += units;
            total_active_seconds += completed.total_active_seconds;
            utilization_sum += utilization;
        }

        tx.commit().await?;

        if stats.total_tasks_completed > 0 {
            stats.average_task_time_seconds =
                total_active_seconds as f64 / stats.total_tasks_completed as f64;
        }
        if stats.operators_processed > 0 {
            stats.average_utilization_percent =
                utilization_sum / stats.operators_processed as f64;
        }

        Ok(stats)
    }
}

/// `[D, D+1)` as UTC instants for the local date D.
fn day_bounds(date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start_naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| WmsError::Internal(format!("invalid date {date}")))?;
    let start = Local
        .from_local_datetime(&start_naive)
        .earliest()
        .ok_or_else(|| WmsError::Internal(format!("ambiguous local midnight for {date}")))?
        .with_timezone(&Utc);
    Ok((start, start + ChronoDuration::days(1)))
}

/// Count/active-time statistics over completed tasks. Active time prefers
/// the recorded `actual_time_seconds`, falling back to the clamped
/// completed/started delta.
async fn completed_task_stats(
    conn: &mut sqlx::PgConnection,
    operator_id: Uuid,
    day_start: DateTime<Utc>,
    day_end: DateTime<Utc>,
) -> Result<CompletedTaskStats> {
    let stats = sqlx::query_as::<_, CompletedTaskStats>(
        "SELECT COUNT(*) AS tasks_completed, \
                COALESCE(SUM(active_time), 0)::BIGINT AS total_active_seconds, \
                COALESCE(AVG(active_time), 0)::DOUBLE PRECISION AS avg_task_time_seconds \
         FROM ( \
             SELECT COALESCE( \
                 t.actual_time_seconds::BIGINT, \
                 CASE WHEN t.started_at IS NOT NULL AND t.completed_at IS NOT NULL \
                      THEN GREATEST(0, EXTRACT(EPOCH FROM (t.completed_at - t.started_at))::BIGINT) \
                      ELSE 0 END) AS active_time \
             FROM wms_tasks t \
             WHERE t.assigned_operator_id = $1 \
               AND t.status = 'completed' \
               AND t.completed_at >= $2 AND t.completed_at < $3 \
         ) completed",
    )
    .bind(operator_id)
    .bind(day_start)
    .bind(day_end)
    .fetch_one(&mut *conn)
    .await?;
    Ok(stats)
}

/// Sum of line quantities across the operator's completed tasks for the day.
async fn units_processed(
    conn: &mut sqlx::PgConnection,
    operator_id: Uuid,
    day_start: DateTime<Utc>,
    day_end: DateTime<Utc>,
) -> Result<i64> {
    let (units,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(l.quantity), 0)::BIGINT \
         FROM wms_tasks t \
         JOIN wms_task_lines l ON l.task_id = t.id \
         WHERE t.assigned_operator_id = $1 \
           AND t.status = 'completed' \
           AND t.completed_at >= $2 AND t.completed_at < $3",
    )
    .bind(operator_id)
    .bind(day_start)
    .bind(day_end)
    .fetch_one(&mut *conn)
    .await?;
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn next_run_advances_a_full_day_when_past() {
        let aggregator_config = MetricsConfig {
            run_hour: 23,
            run_minute: 59,
            run_on_startup: false,
        };
        // Exercised indirectly: duration is always positive and below 24h.
        let aggregator = LaborMetricsAggregator {
            pool: sqlx::PgPool::connect_lazy("postgresql://localhost/unused").unwrap(),
            config: aggregator_config,
        };
        let duration = aggregator.duration_until_next_run(Local::now());
        assert!(duration <= std::time::Duration::from_secs(24 * 3600));
        assert!(duration > std::time::Duration::ZERO);
    }
}
