//! Configuration module for environment variable parsing.
//!
//! Reads all configuration from environment variables. Signing secret, site
//! origin, database URL, and upstream API keys are required: a missing value
//! is a startup error and the process must not serve traffic without them.

use std::env;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared HMAC secret for feedback and unsubscribe tokens
    pub token_secret: String,

    /// Public site origin; CORS allow-origin and redirect destinations
    pub site_url: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Resend API key for outbound email
    pub resend_api_key: String,

    /// Google Generative Language API key for content generation
    pub google_ai_api_key: String,

    /// Base URL for the action links embedded in emails
    pub public_api_url: String,

    /// From header for outbound email
    pub email_from: String,

    /// Port for the web server to listen on
    pub port: u16,

    /// HTTP request timeout in milliseconds for upstream calls
    pub request_timeout_ms: u64,

    /// Optional shared secret protecting the dispatch trigger
    pub dispatch_auth_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error naming the variable when a required setting is
    /// missing. Callers must treat this as fatal.
    pub fn from_env() -> Result<Self> {
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        Ok(Config {
            token_secret: require("FEEDBACK_TOKEN_SECRET")?,

            site_url: require("SITE_URL")?.trim_end_matches('/').to_string(),

            database_url: require("DATABASE_URL")?,

            resend_api_key: require("RESEND_API_KEY")?,

            google_ai_api_key: require("GOOGLE_AI_API_KEY")?,

            public_api_url: env::var("PUBLIC_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| format!("http://localhost:{}", port)),

            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Etymology Daily <onboarding@resend.dev>".to_string()),

            port,

            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),

            dispatch_auth_token: env::var("DISPATCH_AUTH_TOKEN")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        })
    }
}

/// Read a required environment variable, rejecting blank values.
fn require(name: &str) -> Result<String> {
    let value = env::var(name).with_context(|| format!("{} must be configured", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} must not be empty", name);
    }
    Ok(value)
}
