//! Task-generation queue consumer: dequeue, invoke the generation service,
//! acknowledge or back off.

use crate::config::QueueConfig;
use crate::error::WmsError;
use crate::generation::{NormalizedOrderEvent, TaskGenerationService};
use crate::messaging::pgmq_client::{PgmqClient, QueueMessage};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const READ_BATCH: i32 = 10;
const READ_VISIBILITY_SECONDS: i32 = 30;
const IDLE_POLL: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct GenerationConsumer {
    client: PgmqClient,
    service: TaskGenerationService,
    config: QueueConfig,
}

impl GenerationConsumer {
    pub fn new(client: PgmqClient, service: TaskGenerationService, config: QueueConfig) -> Self {
        Self {
            client,
            service,
            config,
        }
    }

    pub fn start(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let consumer = self.clone();
        tokio::spawn(async move {
            info!(
                queue = %consumer.config.generation_queue,
                max_attempts = consumer.config.max_attempts,
                "Task generation consumer started"
            );

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    result = consumer.poll_once() => {
                        match result {
                            Ok(processed) if processed == 0 => {
                                tokio::time::sleep(IDLE_POLL).await;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                error!(error = %e, "Queue poll failed");
                                tokio::time::sleep(IDLE_POLL).await;
                            }
                        }
                    }
                }
            }

            info!("Task generation consumer stopped");
        })
    }

    /// Read one batch and process each message. Returns the number of
    /// messages seen.
    async fn poll_once(&self) -> Result<usize, sqlx::Error> {
        let messages = self
            .client
            .read(
                &self.config.generation_queue,
                READ_VISIBILITY_SECONDS,
                READ_BATCH,
            )
            .await?;

        let count = messages.len();
        for message in messages {
            self.process_message(message).await;
        }
        Ok(count)
    }

    async fn process_message(&self, message: QueueMessage) {
        let queue = &self.config.generation_queue;

        let event: NormalizedOrderEvent = match serde_json::from_value(message.message.clone()) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    msg_id = message.msg_id,
                    error = %e,
                    "Unparseable generation job, archiving"
                );
                self.finish(queue, message.msg_id, FinishAction::Archive).await;
                return;
            }
        };

        match self.service.generate(&event).await {
            Ok(outcome) => {
                debug!(
                    msg_id = message.msg_id,
                    event_key = %event.event_key,
                    skipped = outcome.skipped,
                    tasks = outcome.tasks.len(),
                    "Generation job processed"
                );
                self.finish(queue, message.msg_id, FinishAction::Delete).await;
            }
            // Invalid input is permanent; retrying cannot fix the payload.
            Err(WmsError::InvalidInput(reason)) => {
                warn!(
                    msg_id = message.msg_id,
                    event_key = %event.event_key,
                    reason = %reason,
                    "Generation job rejected, archiving"
                );
                self.finish(queue, message.msg_id, FinishAction::Archive).await;
            }
            Err(e) => {
                if message.read_ct >= self.config.max_attempts {
                    error!(
                        msg_id = message.msg_id,
                        event_key = %event.event_key,
                        attempts = message.read_ct,
                        error = %e,
                        "Generation job exhausted retries, archiving"
                    );
                    self.finish(queue, message.msg_id, FinishAction::Archive).await;
                } else {
                    let backoff = self.backoff_seconds(message.read_ct);
                    warn!(
                        msg_id = message.msg_id,
                        event_key = %event.event_key,
                        attempt = message.read_ct,
                        backoff_seconds = backoff,
                        error = %e,
                        "Generation job failed, backing off"
                    );
                    if let Err(e) = self
                        .client
                        .set_visibility_timeout(queue, message.msg_id, backoff)
                        .await
                    {
                        warn!(msg_id = message.msg_id, error = %e, "Failed to set backoff");
                    }
                }
            }
        }
    }

    /// Exponential backoff: base doubles per completed attempt.
    fn backoff_seconds(&self, read_ct: i32) -> i32 {
        let exponent = read_ct.max(1) - 1;
        self.config
            .backoff_base_seconds
            .saturating_mul(1 << exponent.min(16))
    }

    async fn finish(&self, queue: &str, msg_id: i64, action: FinishAction) {
        let result = match action {
            FinishAction::Delete => self.client.delete(queue, msg_id).await,
            FinishAction::Archive => self.client.archive(queue, msg_id).await,
        };
        if let Err(e) = result {
            warn!(msg_id, error = %e, "Failed to acknowledge queue message");
        }
    }
}

#[derive(Clone, Copy)]
enum FinishAction {
    Delete,
    Archive,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn consumer() -> GenerationConsumer {
        let pool = PgPool::connect_lazy("postgresql://localhost/unused").unwrap();
        GenerationConsumer::new(
            PgmqClient::new_with_pool(pool.clone()),
            TaskGenerationService::new(pool, crate::config::GenerationTuning::default()),
            QueueConfig {
                generation_queue: "task_generation".to_string(),
                max_attempts: 5,
                backoff_base_seconds: 1,
            },
        )
    }

    #[tokio::test]
    async fn backoff_doubles_per_attempt() {
        let consumer = consumer();
        assert_eq!(consumer.backoff_seconds(1), 1);
        assert_eq!(consumer.backoff_seconds(2), 2);
        assert_eq!(consumer.backoff_seconds(3), 4);
        assert_eq!(consumer.backoff_seconds(4), 8);
    }
}
