//! Shared application state: process-wide resources acquired at startup.

use crate::config::WmsConfig;
use crate::events::EventBus;
use crate::messaging::PgmqClient;
use crate::realtime::RealtimeGateway;
use crate::services::{OperatorService, TaskService};
use crate::web::auth::JwtAuthenticator;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<WmsConfig>,
    pub bus: EventBus,
    pub task_service: TaskService,
    pub operator_service: OperatorService,
    pub queue_client: PgmqClient,
    pub authenticator: JwtAuthenticator,
    pub gateway: Arc<RealtimeGateway>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: Arc<WmsConfig>,
        bus: EventBus,
        authenticator: JwtAuthenticator,
        gateway: Arc<RealtimeGateway>,
    ) -> Self {
        let task_service = TaskService::new(pool.clone(), bus.clone());
        let operator_service = OperatorService::new(pool.clone(), bus.clone());
        let queue_client = PgmqClient::new_with_pool(pool.clone());
        Self {
            pool,
            config,
            bus,
            task_service,
            operator_service,
            queue_client,
            authenticator,
            gateway,
        }
    }
}
