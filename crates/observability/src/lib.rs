//! Observability bootstrap for memberhub services.

pub mod tracing;

pub use tracing::init;
