//! Liveness endpoint.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use dstools_core::StorageType;
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub(crate) struct HealthCheckResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub storage_types: Vec<StorageType>,
}

/// Reports the process as alive along with the backends compiled into this build.
/// Never touches storage.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthCheckResponse {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            storage_types: state.dispatcher.supported_types(),
        }),
    )
}
