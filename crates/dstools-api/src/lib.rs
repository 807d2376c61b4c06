//! dstools API Library
//!
//! HTTP front end for the storage dispatcher: one route per operation plus a batch
//! route, each response carrying a trace id and the request duration.

pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;

pub use error::{HttpAppError, ValidatedJson};
pub use setup::routes::setup_routes;
pub use state::AppState;
