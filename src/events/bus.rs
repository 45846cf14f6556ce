//! Event bus over PostgreSQL NOTIFY/LISTEN using sqlx::PgListener.

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{RealtimeEvent, RealtimeEventType, REALTIME_CHANNEL};
use crate::error::{Result, WmsError};

/// pg_notify payloads are capped at 8000 bytes.
const MAX_PAYLOAD_BYTES: usize = 7800;

/// Trait for in-process consumers of realtime events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: RealtimeEvent) -> Result<()>;
}

/// Subscriber-side statistics.
#[derive(Debug, Clone, Default)]
pub struct BusStats {
    pub events_published: u64,
    pub events_received: u64,
    pub parse_errors: u64,
    pub handler_errors: u64,
    pub last_event_at: Option<SystemTime>,
}

/// Cross-process event bus. Exactly one publisher path and one subscriber
/// loop per process; handlers are registered before `start_subscriber`.
#[derive(Clone)]
pub struct EventBus {
    pool: PgPool,
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
    stats: Arc<RwLock<BusStats>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers_len", &self.handlers.read().len())
            .field("stats", &*self.stats.read())
            .finish()
    }
}

impl EventBus {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            handlers: Arc::new(RwLock::new(Vec::new())),
            stats: Arc::new(RwLock::new(BusStats::default())),
        }
    }

    pub fn stats(&self) -> BusStats {
        self.stats.read().clone()
    }

    /// Register an in-process handler. Handlers run sequentially on the
    /// subscriber task; a failing handler never affects the others.
    pub fn register_handler(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().push(handler);
    }

    /// Validate, stamp, serialize, and publish one event to the shared
    /// channel. `occurred_at` is stamped by `RealtimeEvent::new`; callers
    /// constructing envelopes manually keep their own timestamp.
    pub async fn publish(
        &self,
        event_type: RealtimeEventType,
        payload: serde_json::Value,
    ) -> Result<()> {
        self.publish_event(RealtimeEvent::new(event_type, payload)).await
    }

    pub async fn publish_event(&self, event: RealtimeEvent) -> Result<()> {
        let serialized = event.to_json()?;
        if serialized.len() > MAX_PAYLOAD_BYTES {
            return Err(WmsError::EventError(format!(
                "event payload exceeds pg_notify limit: {} bytes",
                serialized.len()
            )));
        }

        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(REALTIME_CHANNEL)
            .bind(&serialized)
            .execute(&self.pool)
            .await
            .map_err(|e| WmsError::EventError(format!("publish failed: {e}")))?;

        self.stats.write().events_published += 1;
        debug!(event_type = %event.event_type, "Published realtime event");
        Ok(())
    }

    /// Start the single process-local subscriber. Parses each notification
    /// and dispatches to every registered handler, catching and logging
    /// handler errors individually.
    pub async fn start_subscriber(&self) -> Result<JoinHandle<()>> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| WmsError::EventError(format!("listener connect failed: {e}")))?;
        listener
            .listen(REALTIME_CHANNEL)
            .await
            .map_err(|e| WmsError::EventError(format!("listen failed: {e}")))?;

        info!(channel = REALTIME_CHANNEL, "Realtime event subscriber started");

        let handlers = Arc::clone(&self.handlers);
        let stats = Arc::clone(&self.stats);

        let handle = tokio::spawn(async move {
            let mut stream = listener.into_stream();

            while let Some(notification) = stream.next().await {
                match notification {
                    Ok(notification) => {
                        {
                            let mut stats = stats.write();
                            stats.events_received += 1;
                            stats.last_event_at = Some(SystemTime::now());
                        }

                        let event = match RealtimeEvent::from_json(notification.payload()) {
                            Ok(event) => event,
                            Err(e) => {
                                stats.write().parse_errors += 1;
                                warn!(
                                    channel = notification.channel(),
                                    error = %e,
                                    "Failed to parse realtime event"
                                );
                                continue;
                            }
                        };

                        let registered: Vec<Arc<dyn EventHandler>> =
                            handlers.read().iter().cloned().collect();
                        for handler in registered {
                            if let Err(e) = handler.handle_event(event.clone()).await {
                                stats.write().handler_errors += 1;
                                error!(event_type = %event.event_type, error = %e, "Event handler failed");
                            }
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Realtime subscriber connection error");
                        break;
                    }
                }
            }

            info!("Realtime event subscriber loop ended");
        });

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct RecordingHandler {
        seen: Arc<RwLock<Vec<RealtimeEvent>>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle_event(&self, event: RealtimeEvent) -> Result<()> {
            self.seen.write().push(event);
            Ok(())
        }
    }

    #[test]
    fn oversized_payload_is_rejected_before_publish() {
        let event = RealtimeEvent::new(
            RealtimeEventType::TaskUpdated,
            json!({"blob": "x".repeat(MAX_PAYLOAD_BYTES + 1)}),
        );
        let serialized = event.to_json().unwrap();
        assert!(serialized.len() > MAX_PAYLOAD_BYTES);
    }

    #[tokio::test]
    async fn handlers_record_dispatched_events() {
        let seen = Arc::new(RwLock::new(Vec::new()));
        let handler = RecordingHandler { seen: Arc::clone(&seen) };
        let event = RealtimeEvent::new(RealtimeEventType::TaskAssigned, json!({"taskId": "x"}));

        handler.handle_event(event.clone()).await.unwrap();
        assert_eq!(seen.read().len(), 1);
        assert_eq!(seen.read()[0].event_type, RealtimeEventType::TaskAssigned);
    }
}
