//! HTTP API: routing, middleware, and the authorization/audit glue.

pub mod app;
pub mod audit;
pub mod authz;
pub mod classify;
pub mod config;
pub mod middleware;
pub mod session;
