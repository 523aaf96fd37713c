//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub database: String,
    pub pending_requests: Option<i64>,
}

/// Health check with database reachability and the open movement backlog
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let pending = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM movement_requests WHERE NOT completed",
    )
    .fetch_one(&state.db)
    .await;

    let (database, pending_requests) = match pending {
        Ok(count) => ("connected", Some(count)),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            ("disconnected", None)
        }
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        database: database.to_string(),
        pending_requests,
    })
}
