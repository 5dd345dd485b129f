use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::infrastructure::db::{check_connection, DbPool};
use crate::infrastructure::transport::Transport;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn health_ready(
    State((pool, transport)): State<(Arc<DbPool>, Arc<dyn Transport>)>,
) -> impl IntoResponse {
    let database = match check_connection(&pool).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    let transport_status = match transport.get_status().await {
        Ok(status) => status.status,
        Err(_) => "unreachable".to_string(),
    };

    if database == "connected" {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "database": database,
                "transport": transport_status
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "database": database,
                "transport": transport_status
            })),
        )
    }
}
