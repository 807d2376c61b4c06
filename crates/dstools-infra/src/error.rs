//! HTTP error response shape
//!
//! The `IntoResponse` conversion lives in the API crate; this is only the body.

use dstools_core::{ErrorMetadata, StorageOpError};
use serde::Serialize;

/// Standard error response format for HTTP APIs
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    pub code: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl ErrorResponse {
    pub fn from_error(err: &StorageOpError, trace_id: Option<String>) -> Self {
        Self {
            error: err.to_string(),
            details: Some(err.detail().to_string()),
            error_type: Some(format!("{:?}", err.kind())),
            code: err.error_code().to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action().map(str::to_string),
            trace_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_stable_code() {
        let err = StorageOpError::Timeout("analyze /data (local): no result within 1.0s".into());
        let body = serde_json::to_value(ErrorResponse::from_error(&err, Some("t-1".into()))).unwrap();
        assert_eq!(body["code"], "STORAGE_TIMEOUT");
        assert_eq!(body["recoverable"], true);
        assert_eq!(body["trace_id"], "t-1");
        assert_eq!(body["error_type"], "Timeout");
    }
}
