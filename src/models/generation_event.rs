use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Processed generation event. Maps to `wms_task_generation_events`;
/// `event_key` is globally unique and serves as the idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TaskGenerationEvent {
    pub id: Uuid,
    pub event_key: String,
    pub event_type: String,
    pub source_document_id: String,
    pub payload: serde_json::Value,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTaskGenerationEvent {
    pub event_key: String,
    pub event_type: String,
    pub source_document_id: String,
    pub payload: serde_json::Value,
}

impl TaskGenerationEvent {
    /// Insert with `ON CONFLICT (event_key) DO NOTHING`. `None` means the
    /// key was already recorded and the event must be skipped.
    pub async fn insert_if_absent<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        new_event: &NewTaskGenerationEvent,
    ) -> Result<Option<TaskGenerationEvent>, sqlx::Error> {
        sqlx::query_as::<_, TaskGenerationEvent>(
            "INSERT INTO wms_task_generation_events \
             (id, event_key, event_type, source_document_id, payload) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (event_key) DO NOTHING \
             RETURNING id, event_key, event_type, source_document_id, payload, processed_at",
        )
        .bind(Uuid::new_v4())
        .bind(&new_event.event_key)
        .bind(&new_event.event_type)
        .bind(&new_event.source_document_id)
        .bind(&new_event.payload)
        .fetch_optional(executor)
        .await
    }
}
