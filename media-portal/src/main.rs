use dotenvy::dotenv;
use media_portal::config::get_configuration;
use media_portal::services::{
    CredentialAuthorizer, LazyMongo, MongoCredentialBackend, SessionAuth,
};
use media_portal::startup::build_router;
use media_portal::AppState;
use service_core::observability::logging::init_tracing;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "media-portal",
        &configuration.telemetry.log_level,
        configuration.telemetry.otlp_endpoint.as_deref(),
    )?;

    // Connects on first use
    let db = LazyMongo::new(
        configuration.mongodb.uri.clone(),
        configuration.mongodb.database.clone(),
    );
    let backend = Arc::new(MongoCredentialBackend::new(db.clone()));
    let session_auth = Arc::new(SessionAuth::new(CredentialAuthorizer::new(backend)));

    let app = build_router(AppState::new(session_auth, db), &configuration.server);

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting media-portal on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
