//! Etymology Daily web server.
//!
//! Serves the subscription, confirmation, feedback, unsubscribe, and
//! dispatch-trigger endpoints. Refuses to start without the signing secret,
//! site origin, database, and upstream API keys.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use etymology::{AppState, Config, GeminiProvider, PgStore, ResendMailer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration; missing secrets are fatal here
    let config = Config::from_env()?;
    info!(
        port = config.port,
        site_url = %config.site_url,
        dispatch_auth_configured = config.dispatch_auth_token.is_some(),
        "config_loaded"
    );

    let store = PgStore::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    info!("database_connected");

    // One HTTP client shared by the content provider and the mail transport
    let client = Client::builder()
        .build()
        .context("Failed to create HTTP client")?;
    let timeout = Duration::from_millis(config.request_timeout_ms);

    let provider = GeminiProvider::new(client.clone(), config.google_ai_api_key.clone(), timeout);
    let mailer = ResendMailer::new(
        client,
        config.resend_api_key.clone(),
        config.email_from.clone(),
        timeout,
    );

    let port = config.port;
    let state = AppState::new(config, Arc::new(store), Arc::new(provider), Arc::new(mailer));

    let app = etymology::web::router(state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
