//! Vigil Dashboard - Web interface for container scan results
//!
//! This application serves the security dashboard and the JSON API that
//! triggers scans, reads summary data, and clears stored results.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil_dashboard=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Vigil Dashboard...");

    // Get configuration from environment
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:./data/vigil.db".to_string());
    let port: u16 = std::env::var("DASHBOARD_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5001);

    // Initialize database; the schema is created by vigil-setup
    let db = match vigil_core::Database::new(&database_url).await {
        Ok(db) => db,
        Err(err) => {
            tracing::error!("Database not found or unreadable ({}). Run vigil-setup first.", err);
            return Err(err.into());
        }
    };
    tracing::info!("Connected to database");

    // Start the web server
    let app = api::create_router(db);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Dashboard listening on http://localhost:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
