//! Warehouse core server: API, realtime gateway, and the worker fleet in
//! one process. Resources are acquired up front and released on shutdown.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use wms_core::assignment::AssignmentWorker;
use wms_core::database::Database;
use wms_core::events::EventBus;
use wms_core::generation::TaskGenerationService;
use wms_core::labor::LaborMetricsAggregator;
use wms_core::logging::init_structured_logging;
use wms_core::messaging::{GenerationConsumer, PgmqClient};
use wms_core::realtime::RealtimeGateway;
use wms_core::web::auth::JwtAuthenticator;
use wms_core::web::state::AppState;
use wms_core::WmsConfig;

#[tokio::main]
async fn main() {
    init_structured_logging();

    if let Err(e) = run().await {
        error!(error = %e, "Server exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(WmsConfig::from_env()?);

    let database = Database::connect(&config.database).await?;
    // Unreachable database is fatal at startup.
    database.health_check().await?;
    let pool = database.pool().clone();

    let authenticator = JwtAuthenticator::from_settings(&config.auth)?;

    let bus = EventBus::new(pool.clone());
    let gateway = Arc::new(RealtimeGateway::new(authenticator.clone(), bus.clone()));
    bus.register_handler(gateway.clone());
    let subscriber_handle = bus.start_subscriber().await?;

    let queue_client = PgmqClient::new_with_pool(pool.clone());
    queue_client
        .create_queue(&config.queue.generation_queue)
        .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let generation_service = TaskGenerationService::new(pool.clone(), config.generation);
    let consumer = GenerationConsumer::new(
        queue_client.clone(),
        generation_service,
        config.queue.clone(),
    );
    let consumer_handle = consumer.start(shutdown_rx.clone());

    let assignment_worker = AssignmentWorker::new(pool.clone(), bus.clone(), config.assignment);
    let assignment_handle = assignment_worker.start(shutdown_rx.clone());

    let aggregator = LaborMetricsAggregator::new(pool.clone(), config.metrics);
    let aggregator_handle = aggregator.start(shutdown_rx.clone());

    let app_state = AppState::new(
        pool.clone(),
        Arc::clone(&config),
        bus.clone(),
        authenticator,
        Arc::clone(&gateway),
    );
    let app = wms_core::web::create_app(app_state);

    let bind_address = std::env::var("WMS_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(bind_address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down workers");
    let _ = shutdown_tx.send(true);
    let _ = consumer_handle.await;
    let _ = assignment_handle.await;
    let _ = aggregator_handle.await;

    gateway.close();
    subscriber_handle.abort();
    database.close().await;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
