//! HTTP endpoint handlers.
//!
//! Handlers stay thin: decode the request, call the matching component, map
//! the result. All domain logic lives in the token codec, the dispatch
//! pipeline, and the feedback recorder; all error-to-status mapping lives in
//! [`ServiceError`].

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::content::ContentProvider;
use crate::dispatch::{run_dispatch, DispatchReport};
use crate::error::ServiceError;
use crate::feedback;
use crate::mail::MailTransport;
use crate::render;
use crate::store::Store;
use crate::token::TokenCodec;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub provider: Arc<dyn ContentProvider>,
    pub mailer: Arc<dyn MailTransport>,
    pub codec: TokenCodec,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        provider: Arc<dyn ContentProvider>,
        mailer: Arc<dyn MailTransport>,
    ) -> Self {
        let codec = TokenCodec::new(config.token_secret.clone());
        Self {
            config: Arc::new(config),
            store,
            provider,
            mailer,
            codec,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Subscribe + Confirm
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct SubscribeResponse {
    pub success: bool,
}

/// Create a pending subscriber and send the confirmation email.
pub async fn subscribe(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<SubscribeResponse>, ServiceError> {
    let email = request.email.trim().to_string();
    if email.is_empty() || !email.contains('@') || email.len() > 320 {
        return Err(ServiceError::Validation(
            "A valid email address is required".to_string(),
        ));
    }

    let confirmation_token = hex::encode(rand::random::<[u8; 32]>());
    let subscriber = state
        .store
        .insert_subscriber(&email, &confirmation_token)
        .await?;

    let url = render::confirmation_url(&state.config.site_url, &confirmation_token);
    let html = render::confirmation_email_html(&url);
    state
        .mailer
        .send(
            &subscriber.email,
            "Confirm your Etymology Daily subscription",
            &html,
        )
        .await?;

    info!(email = %subscriber.email, "subscription_pending");

    Ok(Json(SubscribeResponse { success: true }))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Serialize)]
pub struct ConfirmResponse {
    pub success: bool,
    pub email: String,
}

/// Activate the subscriber holding this confirmation token.
pub async fn confirm(
    State(state): State<AppState>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, ServiceError> {
    if request.token.is_empty() {
        return Err(ServiceError::Validation("Token is required".to_string()));
    }

    let subscriber = state
        .store
        .confirm_subscriber(&request.token)
        .await?
        .ok_or_else(|| {
            ServiceError::Validation("Invalid or expired confirmation token".to_string())
        })?;

    info!(email = %subscriber.email, "subscription_confirmed");

    Ok(Json(ConfirmResponse {
        success: true,
        email: subscriber.email,
    }))
}

// =============================================================================
// Dispatch Trigger
// =============================================================================

/// Trigger one dispatch run. No request body.
///
/// When `DISPATCH_AUTH_TOKEN` is configured the `X-Dispatch-Auth` header
/// must match; when it is not, the trigger is open and logged as such.
pub async fn dispatch(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DispatchReport>, ServiceError> {
    let provided = headers
        .get("X-Dispatch-Auth")
        .and_then(|v| v.to_str().ok());

    if !dispatch_authorized(state.config.dispatch_auth_token.as_deref(), provided) {
        warn!("dispatch_auth_rejected");
        return Err(ServiceError::Unauthorized);
    }

    let report = run_dispatch(
        state.store.as_ref(),
        state.provider.as_ref(),
        state.mailer.as_ref(),
        &state.codec,
        &state.config,
    )
    .await?;

    Ok(Json(report))
}

fn dispatch_authorized(expected: Option<&str>, provided: Option<&str>) -> bool {
    match (expected, provided) {
        (Some(expected), Some(provided)) => expected == provided,
        (Some(_), None) => false,
        (None, _) => {
            warn!("dispatch_auth_not_configured");
            true
        }
    }
}

// =============================================================================
// Feedback + Unsubscribe
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct FeedbackParams {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub saying: String,
    #[serde(default)]
    pub feedback: String,
}

/// Record an emailed like/dislike vote, then bounce to the site.
pub async fn record_feedback(
    State(state): State<AppState>,
    Query(params): Query<FeedbackParams>,
) -> Result<Response, ServiceError> {
    let target = feedback::record_feedback(
        state.store.as_ref(),
        &state.codec,
        &state.config.site_url,
        &params.token,
        &params.saying,
        &params.feedback,
    )
    .await?;

    Ok(redirect_found(&target))
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeParams {
    #[serde(default)]
    pub token: String,
}

/// Deactivate the subscriber an emailed token encodes, then bounce to the
/// site.
pub async fn unsubscribe(
    State(state): State<AppState>,
    Query(params): Query<UnsubscribeParams>,
) -> Result<Response, ServiceError> {
    let target = feedback::unsubscribe(
        state.store.as_ref(),
        &state.codec,
        &state.config.site_url,
        &params.token,
    )
    .await?;

    Ok(redirect_found(&target))
}

/// 302 redirect. The email links are followed by browsers, and FOUND is
/// what the original service answered with.
fn redirect_found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
