//! Transactional task generation from normalized order events.

use crate::config::GenerationTuning;
use crate::error::{Result, WmsError};
use crate::generation::logic::{build_task_specs, NormalizedOrderEvent};
use crate::models::{NewTask, NewTaskGenerationEvent, NewTaskLine, Task, TaskGenerationEvent, TaskLine, Zone};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, info, warn};

/// Result of one generation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub skipped: bool,
    pub reason: Option<String>,
    pub tasks: Vec<Task>,
}

impl GenerationOutcome {
    fn duplicate() -> Self {
        Self {
            skipped: true,
            reason: Some("duplicate_event".to_string()),
            tasks: Vec::new(),
        }
    }

    fn created(tasks: Vec<Task>) -> Self {
        Self {
            skipped: false,
            reason: None,
            tasks,
        }
    }
}

/// Consumes normalized events and writes the resulting tasks in a single
/// transaction. The event-key insert is the idempotency gate: losing the
/// `ON CONFLICT` race means another worker already processed this event.
#[derive(Debug, Clone)]
pub struct TaskGenerationService {
    pool: PgPool,
    tuning: GenerationTuning,
}

impl TaskGenerationService {
    pub fn new(pool: PgPool, tuning: GenerationTuning) -> Self {
        Self { pool, tuning }
    }

    /// Process one normalized event. Any failure after the event insert
    /// rolls the whole transaction back, so the event stays retriable.
    pub async fn generate(&self, event: &NormalizedOrderEvent) -> Result<GenerationOutcome> {
        let mut tx = self.pool.begin().await?;

        let inserted = TaskGenerationEvent::insert_if_absent(
            &mut *tx,
            &NewTaskGenerationEvent {
                event_key: event.event_key.clone(),
                event_type: event.event_type.as_str().to_string(),
                source_document_id: event.source_document_id.clone(),
                payload: event.payload.clone(),
            },
        )
        .await?;

        if inserted.is_none() {
            tx.commit().await?;
            debug!(
                event_key = %event.event_key,
                "Generation event already processed, skipping"
            );
            return Ok(GenerationOutcome::duplicate());
        }

        // One-shot zone lookup for every routing location in the event.
        let mut location_ids: Vec<i64> = event
            .lines
            .iter()
            .filter_map(|line| line.pick_location_id.or(line.destination_location_id))
            .collect();
        location_ids.sort_unstable();
        location_ids.dedup();

        let zone_map = Zone::map_for_locations(&mut *tx, &location_ids).await?;

        let missing: Vec<i64> = location_ids
            .iter()
            .copied()
            .filter(|id| !zone_map.contains_key(id))
            .collect();
        if !missing.is_empty() {
            warn!(?missing, event_key = %event.event_key, "Locations without zone mapping");
            return Err(WmsError::InvalidInput(format!(
                "no zone mapping for locations: {missing:?}"
            )));
        }

        let specs = build_task_specs(
            event,
            &self.tuning,
            |location_id| zone_map.get(&location_id).copied(),
            Utc::now(),
        )?;

        let mut tasks = Vec::with_capacity(specs.len());
        for spec in &specs {
            let task = Task::create(
                &mut *tx,
                NewTask {
                    task_type: spec.task_type,
                    priority: spec.priority,
                    zone_id: spec.zone_id,
                    source_document_id: spec.source_document_id.clone(),
                    estimated_time_seconds: spec.estimated_seconds,
                },
            )
            .await?;

            for line in &spec.lines {
                TaskLine::create(
                    &mut *tx,
                    task.id,
                    &NewTaskLine {
                        product_id: line.sku_id,
                        from_location_id: line.from_location_id,
                        to_location_id: line.to_location_id,
                        quantity: line.quantity,
                    },
                )
                .await?;
            }

            tasks.push(task);
        }

        tx.commit().await?;

        info!(
            event_key = %event.event_key,
            source_document_id = %event.source_document_id,
            task_count = tasks.len(),
            "Generated tasks from order event"
        );

        Ok(GenerationOutcome::created(tasks))
    }
}
