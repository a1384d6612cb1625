//! HTTP handlers for bursar-service.

pub mod auth;
pub mod invoices;
pub mod payments;
pub mod reports;
pub mod students;
pub mod users;
pub mod webhooks;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::metrics::get_metrics;
use crate::AppState;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "service": state.config.service_name })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "service": state.config.service_name })),
            )
        }
    }
}

pub async fn metrics() -> impl IntoResponse {
    get_metrics()
}
