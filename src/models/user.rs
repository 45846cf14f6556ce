use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Login account row. Maps to `wms_users`. Managers carry no operator link;
/// operator accounts reference their operator row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub operator_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, role, operator_id, created_at \
             FROM wms_users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(pool)
        .await
    }
}
