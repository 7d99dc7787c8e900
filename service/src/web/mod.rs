//! Web server module: router assembly and endpoint handlers.
//!
//! The router carries request tracing and a CORS policy locked to the single
//! configured site origin - state-mutating endpoints never answer with a
//! wildcard.

pub mod handlers;

use anyhow::{Context, Result};
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use handlers::AppState;

/// Build the application router with tracing and single-origin CORS.
///
/// # Errors
///
/// Fails at startup when the configured site origin is not a valid header
/// value.
pub fn router(state: AppState) -> Result<Router> {
    let origin: HeaderValue = state
        .config
        .site_url
        .parse()
        .context("SITE_URL is not a valid CORS origin")?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-dispatch-auth"),
        ]);

    Ok(Router::new()
        .route("/health", get(handlers::health))
        .route("/subscribe", post(handlers::subscribe))
        .route("/confirm", post(handlers::confirm))
        .route("/dispatch", post(handlers::dispatch))
        .route("/feedback", get(handlers::record_feedback))
        .route("/unsubscribe", get(handlers::unsubscribe))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}
