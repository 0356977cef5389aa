//! HTTP API: server wiring, routing, authentication and response mapping.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
