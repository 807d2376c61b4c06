//! Analyze, list and verify-access endpoints.

use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::ApiResponse;
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Extension, Json};
use dstools_core::{AccessOperation, ContentType, StorageConfig};
use dstools_infra::RequestId;
use dstools_storage::resolve_request;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

/// Fields common to every operation request.
#[derive(Debug, Deserialize)]
pub struct TargetRequest {
    pub location: String,
    #[serde(default)]
    pub storage_type: Option<String>,
    #[serde(default)]
    pub config: Option<StorageConfig>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ListRequest {
    #[serde(flatten)]
    pub target: TargetRequest,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub max_items: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyAccessRequest {
    #[serde(flatten)]
    pub target: TargetRequest,
    #[serde(default)]
    pub operation: AccessOperation,
}

pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Extension(RequestId(trace_id)): Extension<RequestId>,
    ValidatedJson(request): ValidatedJson<TargetRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let start = Instant::now();
    let fail = |e| HttpAppError::new(e, trace_id.clone());

    let (location, config) = resolve_request(
        &request.location,
        request.storage_type.as_deref(),
        request.config,
    )
    .map_err(fail)?;
    let timeout = state.timeout_for(request.timeout_secs).map_err(fail)?;

    let metrics = state
        .dispatcher
        .analyze(&location, &config, timeout)
        .await
        .map_err(fail)?;

    Ok(Json(ApiResponse::new(trace_id, start, metrics)))
}

pub async fn list_contents(
    State(state): State<Arc<AppState>>,
    Extension(RequestId(trace_id)): Extension<RequestId>,
    ValidatedJson(request): ValidatedJson<ListRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let start = Instant::now();
    let fail = |e| HttpAppError::new(e, trace_id.clone());
    let target = request.target;

    let (location, config) =
        resolve_request(&target.location, target.storage_type.as_deref(), target.config)
            .map_err(fail)?;
    let timeout = state.timeout_for(target.timeout_secs).map_err(fail)?;
    let max_items = request.max_items.unwrap_or(state.settings.max_items);

    let listing = state
        .dispatcher
        .list_contents(&location, &config, request.content_type, max_items, timeout)
        .await
        .map_err(fail)?;

    Ok(Json(ApiResponse::new(trace_id, start, listing)))
}

pub async fn verify_access(
    State(state): State<Arc<AppState>>,
    Extension(RequestId(trace_id)): Extension<RequestId>,
    ValidatedJson(request): ValidatedJson<VerifyAccessRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let start = Instant::now();
    let fail = |e| HttpAppError::new(e, trace_id.clone());
    let target = request.target;

    let (location, config) =
        resolve_request(&target.location, target.storage_type.as_deref(), target.config)
            .map_err(fail)?;
    let timeout = state.timeout_for(target.timeout_secs).map_err(fail)?;

    let access = state
        .dispatcher
        .verify_access(&location, &config, request.operation, timeout)
        .await
        .map_err(fail)?;

    Ok(Json(ApiResponse::new(trace_id, start, access)))
}
