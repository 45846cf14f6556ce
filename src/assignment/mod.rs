//! # Task Assignment Worker
//!
//! Periodic loop pairing `created` tasks with eligible operators. Both the
//! candidate batch and the chosen operator row are locked with
//! `FOR UPDATE SKIP LOCKED`, so multiple assigner replicas run without
//! contention and no operator can be double-assigned; the task update is
//! additionally predicated on the task still being `created` in case a
//! manual assignment intervened.

use crate::config::AssignmentConfig;
use crate::events::{EventBus, RealtimeEventType};
use crate::models::{NewTaskStatusLog, Operator, Task, TaskStatusLog};
use crate::error::Result;
use crate::state_machine::TaskStatus;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Statistics for one assignment cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssignmentCycleStats {
    pub scanned: usize,
    pub assigned: usize,
    pub unassigned: usize,
    pub available_operators: i64,
    pub realtime_publish_failures: usize,
    pub duration_ms: u64,
}

#[derive(Clone)]
pub struct AssignmentWorker {
    pool: PgPool,
    bus: EventBus,
    config: AssignmentConfig,
    in_flight: Arc<AtomicBool>,
}

impl AssignmentWorker {
    pub fn new(pool: PgPool, bus: EventBus, config: AssignmentConfig) -> Self {
        Self {
            pool,
            bus,
            config,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the periodic loop. Ticks that land while a cycle is still in
    /// flight are skipped with a notice. Shutdown stops scheduling and
    /// awaits the running cycle.
    pub fn start(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let worker = self.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(worker.config.interval_seconds));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            info!(
                interval_seconds = worker.config.interval_seconds,
                batch_size = worker.config.batch_size,
                "Assignment worker started"
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if worker.in_flight.swap(true, Ordering::SeqCst) {
                            info!("Previous assignment cycle still running, skipping tick");
                            continue;
                        }
                        let cycle_worker = worker.clone();
                        tokio::spawn(async move {
                            if let Err(e) = cycle_worker.run_cycle().await {
                                error!(error = %e, "Assignment cycle failed");
                            }
                            cycle_worker.in_flight.store(false, Ordering::SeqCst);
                        });
                    }
                    _ = shutdown.changed() => {
                        break;
                    }
                }
            }

            // Await the in-flight cycle, bounded.
            let deadline = Instant::now() + Duration::from_secs(30);
            while worker.in_flight.load(Ordering::SeqCst) && Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            info!("Assignment worker stopped");
        })
    }

    /// One assignment cycle. A failed cycle logs and leaves the loop alive.
    pub async fn run_cycle(&self) -> Result<AssignmentCycleStats> {
        let started = Instant::now();
        let mut stats = AssignmentCycleStats::default();

        let mut tx = self.pool.begin().await?;

        stats.available_operators = Operator::available_unassigned_count(&mut *tx).await?;

        let candidates = Task::lock_created_batch(&mut *tx, self.config.batch_size).await?;
        stats.scanned = candidates.len();

        let mut assignments: Vec<Task> = Vec::new();
        for candidate in &candidates {
            let operator = Operator::best_available_for_zone(&mut *tx, candidate.zone_id).await?;
            let Some(operator) = operator else {
                stats.unassigned += 1;
                continue;
            };

            match Task::try_assign(&mut *tx, candidate.id, operator.id).await? {
                Some(assigned) => {
                    TaskStatusLog::create(
                        &mut *tx,
                        &NewTaskStatusLog {
                            task_id: assigned.id,
                            from_status: TaskStatus::Created.as_str().to_string(),
                            to_status: TaskStatus::Assigned.as_str().to_string(),
                            task_version: assigned.version,
                            changed_by_operator_id: None,
                        },
                    )
                    .await?;
                    assignments.push(assigned);
                }
                None => {
                    // The task left `created` between the batch lock and the
                    // update (manual assignment); nothing to do this cycle.
                    stats.unassigned += 1;
                }
            }
        }

        tx.commit().await?;
        stats.assigned = assignments.len();

        for task in &assignments {
            let payload = json!({
                "taskId": task.id,
                "previousStatus": TaskStatus::Created.as_str(),
                "status": task.status,
                "version": task.version,
                "assignedOperatorId": task.assigned_operator_id,
                "zoneId": task.zone_id,
                "priority": task.priority,
            });

            if let Err(e) = self
                .bus
                .publish(RealtimeEventType::TaskAssigned, payload.clone())
                .await
            {
                warn!(task_id = %task.id, error = %e, "Failed to publish TASK_ASSIGNED");
                stats.realtime_publish_failures += 1;
            }
            if let Err(e) = self.bus.publish(RealtimeEventType::TaskUpdated, payload).await {
                warn!(task_id = %task.id, error = %e, "Failed to publish TASK_UPDATED");
                stats.realtime_publish_failures += 1;
            }
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            scanned = stats.scanned,
            assigned = stats.assigned,
            unassigned = stats.unassigned,
            available_operators = stats.available_operators,
            realtime_publish_failures = stats.realtime_publish_failures,
            duration_ms = stats.duration_ms,
            "Assignment cycle complete"
        );

        Ok(stats)
    }
}
