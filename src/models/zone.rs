use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

/// Zone reference row. Maps to `wms_zones`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Zone {
    pub id: i64,
    pub warehouse_id: i64,
    pub code: String,
    pub name: String,
}

/// Compact zone view embedded in task detail responses.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ZoneSummary {
    pub id: i64,
    pub code: String,
    pub name: String,
}

impl Zone {
    pub async fn find_summary<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        id: i64,
    ) -> Result<Option<ZoneSummary>, sqlx::Error> {
        sqlx::query_as::<_, ZoneSummary>("SELECT id, code, name FROM wms_zones WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// One-shot location → zone mapping for a set of location ids.
    /// Locations without a zone mapping are absent from the result.
    pub async fn map_for_locations<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        location_ids: &[i64],
    ) -> Result<HashMap<i64, i64>, sqlx::Error> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT id, zone_id FROM wms_locations \
             WHERE id = ANY($1) AND zone_id IS NOT NULL",
        )
        .bind(location_ids)
        .fetch_all(executor)
        .await?;
        Ok(rows.into_iter().collect())
    }
}
