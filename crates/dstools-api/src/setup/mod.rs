//! Application setup: routes and server lifecycle.

pub mod routes;
pub mod server;
