//! dstools Infrastructure Library
//!
//! Shared infrastructure for the dstools binaries:
//! - Middleware (request ID)
//! - Telemetry initialization (text or JSON logs)
//! - HTTP error response shape

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub mod error;

// Re-export commonly used types
#[cfg(feature = "middleware")]
pub use middleware::{get_request_id, request_id_middleware, RequestId, REQUEST_ID_HEADER};

#[cfg(feature = "observability-basic")]
pub use telemetry::init_telemetry;

pub use error::ErrorResponse;
