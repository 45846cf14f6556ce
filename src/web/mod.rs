//! # Web API
//!
//! Axum application for the warehouse core: bearer-token auth, task and
//! operator endpoints, order-event ingress, labor analytics, health, and
//! the WebSocket realtime endpoint.

pub mod auth;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::routing::{get, patch, post};
use axum::Router;
use std::time::Duration;

use state::AppState;

/// Build the application router: public routes (login, health, socket
/// upgrade, which authenticates in-handler) and bearer-protected API
/// routes, under the shared middleware stack.
pub fn create_app(app_state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/health", get(handlers::health::health))
        .route("/ws", get(handlers::realtime::ws_upgrade));

    let protected_routes = Router::new()
        .route("/api/order-events", post(handlers::order_events::submit_order_event))
        .route("/api/tasks", get(handlers::tasks::list_tasks))
        .route("/api/tasks/:task_id", get(handlers::tasks::get_task))
        .route("/api/tasks/:task_id/start", post(handlers::tasks::start_task))
        .route("/api/tasks/:task_id/complete", post(handlers::tasks::complete_task))
        .route("/api/tasks/:task_id/pause", post(handlers::tasks::pause_task))
        .route("/api/tasks/:task_id/cancel", post(handlers::tasks::cancel_task))
        .route("/api/tasks/:task_id/status", patch(handlers::tasks::patch_status))
        .route("/api/tasks/:task_id/history", get(handlers::tasks::task_history))
        .route("/api/operators", get(handlers::operators::list_operators))
        .route("/api/operators/:id", get(handlers::operators::get_operator))
        .route(
            "/api/operators/:id/status",
            patch(handlers::operators::update_operator_status),
        )
        .route("/api/labor/overview", get(handlers::labor::overview))
        .route(
            "/api/labor/operator-performance",
            get(handlers::labor::operator_performance),
        )
        .route("/api/labor/zone-workload", get(handlers::labor::zone_workload))
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(tower_http::timeout::TimeoutLayer::new(Duration::from_secs(30)))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state)
}
