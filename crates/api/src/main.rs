use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use memberhub_api::app::{AppDeps, build_app};
use memberhub_api::config::ApiConfig;
use memberhub_api::session::Hs256SessionValidator;
use memberhub_infra::{PostgresAuditStore, PostgresFlagStore, PostgresResourceDirectory};

#[tokio::main]
async fn main() {
    memberhub_observability::init("memberhub-api");

    let config = ApiConfig::from_env();

    let session_secret = std::env::var("SESSION_SECRET").unwrap_or_else(|_| {
        tracing::warn!("SESSION_SECRET not set; using insecure dev default");
        "dev-secret".to_string()
    });

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/memberhub".to_string());
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("failed to connect to postgres");

    let deps = AppDeps {
        flags: Arc::new(PostgresFlagStore::new(pool.clone())),
        audits: Arc::new(PostgresAuditStore::new(pool.clone())),
        resources: Arc::new(PostgresResourceDirectory::new(pool)),
        sessions: Arc::new(Hs256SessionValidator::new(session_secret.as_bytes())),
        config: config.clone(),
    };
    let (app, recorder) = build_app(deps);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {e}", config.bind_addr));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    // Flush every enqueued audit entry before the process exits.
    recorder.shutdown().await;
    tracing::info!("audit writer drained, exiting");
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
