//! Batch endpoint
//!
//! Runs several independent operations in one request. Individual failures are reported
//! per entry with the same error body a single-operation request would return.

use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::ApiResponse;
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Extension, Json};
use dstools_infra::{ErrorResponse, RequestId};
use dstools_storage::{run_batch, BatchItemResult, BatchOperation, BatchOutcome, OperationOutput};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Deserialize)]
pub struct BatchRequestBody {
    pub operations: Vec<BatchOperation>,
    #[serde(default)]
    pub fail_fast: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct BatchItemBody {
    pub index: usize,
    pub location: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<OperationOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
    pub duration_ms: f64,
}

impl From<BatchItemResult> for BatchItemBody {
    fn from(item: BatchItemResult) -> Self {
        let (status, result, error) = match item.outcome {
            BatchOutcome::Succeeded(output) => (ItemStatus::Succeeded, Some(output), None),
            BatchOutcome::Failed(e) => (
                ItemStatus::Failed,
                None,
                Some(ErrorResponse::from_error(&e, None)),
            ),
            BatchOutcome::Skipped => (ItemStatus::Skipped, None, None),
        };
        Self {
            index: item.index,
            location: item.location,
            status,
            result,
            error,
            duration_ms: item.duration_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchResponseBody {
    pub results: Vec<BatchItemBody>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub async fn run(
    State(state): State<Arc<AppState>>,
    Extension(RequestId(trace_id)): Extension<RequestId>,
    ValidatedJson(request): ValidatedJson<BatchRequestBody>,
) -> Result<impl IntoResponse, HttpAppError> {
    let start = Instant::now();
    let options = state.batch_options(request.fail_fast);

    let report = run_batch(&state.dispatcher, request.operations, &options)
        .await
        .map_err(|e| HttpAppError::new(e, trace_id.clone()))?;

    let body = BatchResponseBody {
        succeeded: report.succeeded,
        failed: report.failed,
        skipped: report.skipped,
        results: report.results.into_iter().map(BatchItemBody::from).collect(),
    };

    Ok(Json(ApiResponse::new(trace_id, start, body)))
}
