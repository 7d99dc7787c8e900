//! Etymology Daily dispatch runner.
//!
//! One-shot binary for cron: runs a single dispatch cycle against the
//! configured database and exits. Exit status is non-zero when the run
//! aborts (configuration, storage, or content-provider failure); partial
//! delivery failure is reported in the logs but is a successful run.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use etymology::{run_dispatch, Config, GeminiProvider, PgStore, ResendMailer, TokenCodec};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("dispatch_runner_starting");

    let config = Config::from_env()?;

    let store = PgStore::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

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
    let codec = TokenCodec::new(config.token_secret.clone());

    let report = run_dispatch(&store, &provider, &mailer, &codec, &config)
        .await
        .context("Dispatch run failed")?;

    info!(
        etymology = report.etymology.as_deref().unwrap_or(""),
        total = report.total,
        success = report.success,
        failed = report.failed,
        "dispatch_runner_complete"
    );

    Ok(())
}
