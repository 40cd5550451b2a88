//! HTTP API: session handling, route checks and the approval endpoints.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;
