//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`; the wrapper renders the
//! stable status code and the shared [`ErrorResponse`] body for every `StorageOpError`.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dstools_core::{ErrorMetadata, StorageOpError};
use dstools_infra::{ErrorResponse, RequestId};
use serde::de::DeserializeOwned;

/// Wrapper for `StorageOpError` so it can implement `IntoResponse` (orphan rule).
///
/// Carries the request's trace id so error bodies can be correlated with logs.
#[derive(Debug)]
pub struct HttpAppError {
    pub error: StorageOpError,
    pub trace_id: Option<String>,
}

impl HttpAppError {
    pub fn new(error: StorageOpError, trace_id: impl Into<String>) -> Self {
        Self {
            error,
            trace_id: Some(trace_id.into()),
        }
    }
}

impl From<StorageOpError> for HttpAppError {
    fn from(error: StorageOpError) -> Self {
        Self {
            error,
            trace_id: None,
        }
    }
}

/// Convert JSON body deserialization failures into a 400 with our ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        StorageOpError::Validation(format!("Invalid request body: {}", rejection.body_text()))
            .into()
    }
}

/// JSON body extractor that returns our ErrorResponse format (400 + JSON) on
/// deserialization failure instead of axum's plain-text rejection.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let trace_id = req.extensions().get::<RequestId>().map(|id| id.0.clone());
        let Json(inner) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            let mut err = HttpAppError::from(rejection);
            err.trace_id = trace_id;
            err
        })?;
        Ok(ValidatedJson(inner))
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // The dispatcher already logged operation failures at their own level.
        tracing::debug!(
            error = %self.error,
            error_code = self.error.error_code(),
            status = status.as_u16(),
            "Returning error response"
        );

        let body = ErrorResponse::from_error(&self.error, self.trace_id);
        (status, Json(body)).into_response()
    }
}
