use axum::{middleware, routing::get, routing::post, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::controllers::{health, FeedController, ScheduleController};
use crate::infrastructure::config::Config;
use crate::infrastructure::db::DbPool;
use crate::infrastructure::request_id::request_id_middleware;
use crate::infrastructure::transport::Transport;

/// Start the HTTP server with all routes configured
pub async fn start_http_server(
    pool: Arc<DbPool>,
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    feed_controller: Arc<FeedController>,
    schedule_controller: Arc<ScheduleController>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Health routes
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::health_ready))
        .with_state((pool.clone(), transport.clone()));

    // Feed processing routes
    let feed_routes = Router::new()
        .route("/api/feeds/process", post(FeedController::process_all))
        .route(
            "/api/feeds/:feedId/process",
            post(FeedController::process_feed),
        )
        .with_state(feed_controller.clone());

    // Schedule routes
    let schedule_routes = Router::new()
        .route(
            "/api/schedules/:scheduleId/run",
            post(ScheduleController::run_schedule),
        )
        .route(
            "/api/schedules/:scheduleId/diagnostics",
            get(ScheduleController::diagnostics),
        )
        .route(
            "/api/obligations/:obligationId/approve",
            post(ScheduleController::approve_obligation),
        )
        .with_state(schedule_controller.clone());

    let app = Router::new()
        .merge(health_routes)
        .merge(feed_routes)
        .merge(schedule_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
