//! HTTP handlers
//!
//! Each handler maps one dispatcher operation to one request/response pair and wraps the
//! result with the request's trace id and the measured duration.

pub mod batch;
pub mod health;
pub mod storage;

use serde::Serialize;
use std::time::Instant;

/// Success envelope shared by every operation endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub trace_id: String,
    pub duration_ms: f64,
    pub result: T,
}

impl<T> ApiResponse<T> {
    pub fn new(trace_id: String, start: Instant, result: T) -> Self {
        Self {
            trace_id,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            result,
        }
    }
}
