use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Operator availability states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorStatus {
    Available,
    Busy,
    Offline,
}

impl OperatorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorStatus::Available => "available",
            OperatorStatus::Busy => "busy",
            OperatorStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for OperatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperatorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(OperatorStatus::Available),
            "busy" => Ok(OperatorStatus::Busy),
            "offline" => Ok(OperatorStatus::Offline),
            other => Err(format!("unknown operator status: {other}")),
        }
    }
}

/// Operator row. Maps to `wms_operators`. Shift times are wall-clock
/// `HH:MM[:SS]` strings; the window may cross midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Operator {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub status: String,
    pub shift_start: String,
    pub shift_end: String,
    pub performance_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const OPERATOR_COLUMNS: &str = "id, name, role, status, shift_start, shift_end, \
     performance_score, created_at, updated_at";

impl Operator {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Operator>, sqlx::Error> {
        let query = format!("SELECT {OPERATOR_COLUMNS} FROM wms_operators WHERE id = $1");
        sqlx::query_as::<_, Operator>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let (found,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM wms_operators WHERE id = $1)")
                .bind(id)
                .fetch_one(pool)
                .await?;
        Ok(found)
    }

    pub async fn list(
        pool: &PgPool,
        status: Option<OperatorStatus>,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Operator>, i64), sqlx::Error> {
        let (operators, total) = match status {
            Some(status) => {
                let query = format!(
                    "SELECT {OPERATOR_COLUMNS} FROM wms_operators WHERE status = $1 \
                     ORDER BY name ASC LIMIT $2 OFFSET $3"
                );
                let rows = sqlx::query_as::<_, Operator>(&query)
                    .bind(status.as_str())
                    .bind(limit)
                    .bind((page - 1) * limit)
                    .fetch_all(pool)
                    .await?;
                let (total,): (i64,) =
                    sqlx::query_as("SELECT COUNT(*) FROM wms_operators WHERE status = $1")
                        .bind(status.as_str())
                        .fetch_one(pool)
                        .await?;
                (rows, total)
            }
            None => {
                let query = format!(
                    "SELECT {OPERATOR_COLUMNS} FROM wms_operators \
                     ORDER BY name ASC LIMIT $1 OFFSET $2"
                );
                let rows = sqlx::query_as::<_, Operator>(&query)
                    .bind(limit)
                    .bind((page - 1) * limit)
                    .fetch_all(pool)
                    .await?;
                let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wms_operators")
                    .fetch_one(pool)
                    .await?;
                (rows, total)
            }
        };
        Ok((operators, total))
    }

    pub async fn load_all<'e>(
        executor: impl sqlx::PgExecutor<'e>,
    ) -> Result<Vec<Operator>, sqlx::Error> {
        let query = format!("SELECT {OPERATOR_COLUMNS} FROM wms_operators ORDER BY name ASC");
        sqlx::query_as::<_, Operator>(&query).fetch_all(executor).await
    }

    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        status: OperatorStatus,
    ) -> Result<Option<Operator>, sqlx::Error> {
        let query = format!(
            "UPDATE wms_operators SET status = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {OPERATOR_COLUMNS}"
        );
        sqlx::query_as::<_, Operator>(&query)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Number of available operators with no active task, for cycle stats.
    pub async fn available_unassigned_count(
        conn: &mut sqlx::PgConnection,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM wms_operators o \
             WHERE o.status = 'available' \
               AND NOT EXISTS ( \
                   SELECT 1 FROM wms_tasks t \
                   WHERE t.assigned_operator_id = o.id \
                     AND t.status IN ('assigned', 'in_progress', 'paused'))",
        )
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    /// Best available operator for a zone: linked to the zone, available,
    /// no active task; least work completed today first, then highest
    /// performance score, then seniority. The row is locked with SKIP LOCKED
    /// so two concurrent assigners cannot both choose it.
    pub async fn best_available_for_zone(
        conn: &mut sqlx::PgConnection,
        zone_id: i64,
    ) -> Result<Option<Operator>, sqlx::Error> {
        sqlx::query_as::<_, Operator>(
            "SELECT o.id, o.name, o.role, o.status, o.shift_start, o.shift_end, \
                    o.performance_score, o.created_at, o.updated_at \
             FROM wms_operators o \
             JOIN wms_operator_zones oz ON oz.operator_id = o.id AND oz.zone_id = $1 \
             LEFT JOIN wms_labor_daily_metrics m \
               ON m.operator_id = o.id AND m.metric_date = CURRENT_DATE \
             WHERE o.status = 'available' \
               AND NOT EXISTS ( \
                   SELECT 1 FROM wms_tasks t \
                   WHERE t.assigned_operator_id = o.id \
                     AND t.status IN ('assigned', 'in_progress', 'paused')) \
             ORDER BY COALESCE(m.tasks_completed, 0) ASC, \
                      o.performance_score DESC, \
                      o.created_at ASC \
             LIMIT 1 \
             FOR UPDATE OF o SKIP LOCKED",
        )
        .bind(zone_id)
        .fetch_optional(&mut *conn)
        .await
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in [OperatorStatus::Available, OperatorStatus::Busy, OperatorStatus::Offline] {
            assert_eq!(s.as_str().parse::<OperatorStatus>().unwrap(), s);
        }
    }
}
