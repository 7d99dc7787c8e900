//! Feedback and unsubscribe recording.
//!
//! Both paths consume an emailed action token and apply one idempotent
//! state change, then hand the caller a redirect target on the public site
//! (the caller is a browser following an email link, not an API client).
//! Input validation runs before token verification, and verification runs
//! before any persistence mutation.

use tracing::info;

use crate::error::ServiceError;
use crate::store::{FeedbackKind, Store};
use crate::token::TokenCodec;

/// Upper bound on the saying parameter, independent of token validity.
const MAX_SAYING_CHARS: usize = 500;

/// Record a like/dislike vote authorized by a feedback token.
///
/// The token is verified against the supplied saying, so a token minted for
/// one saying cannot vote on another. Re-votes update the existing row.
/// Returns the redirect target for the confirmation page.
pub async fn record_feedback(
    store: &dyn Store,
    codec: &TokenCodec,
    site_url: &str,
    token: &str,
    saying: &str,
    feedback: &str,
) -> Result<String, ServiceError> {
    if token.is_empty() || saying.is_empty() || feedback.is_empty() {
        return Err(ServiceError::Validation(
            "Missing required parameters".to_string(),
        ));
    }

    let kind = FeedbackKind::from_param(feedback)
        .ok_or_else(|| ServiceError::Validation("Invalid feedback type".to_string()))?;

    if saying.chars().count() > MAX_SAYING_CHARS {
        return Err(ServiceError::Validation("Saying is too long".to_string()));
    }

    let subscriber_id = codec
        .verify_feedback(token, saying)
        .and_then(|id| id.parse().ok())
        .ok_or(ServiceError::Unauthorized)?;

    store.upsert_feedback(subscriber_id, saying, kind).await?;

    info!(
        subscriber_id = %subscriber_id,
        feedback = kind.as_str(),
        "feedback_recorded"
    );

    Ok(format!("{}/feedback?type={}", site_url, kind.as_str()))
}

/// Deactivate the subscriber encoded in an unsubscribe token.
///
/// Safe to re-invoke: deactivating an already-inactive subscriber is a
/// no-op. Returns the redirect target for the success page.
pub async fn unsubscribe(
    store: &dyn Store,
    codec: &TokenCodec,
    site_url: &str,
    token: &str,
) -> Result<String, ServiceError> {
    if token.is_empty() {
        return Err(ServiceError::Validation(
            "Missing unsubscribe token".to_string(),
        ));
    }

    let subscriber_id = codec
        .verify_unsubscribe(token)
        .and_then(|id| id.parse().ok())
        .ok_or(ServiceError::Unauthorized)?;

    let updated = store.deactivate_subscriber(subscriber_id).await?;
    if !updated {
        return Err(ServiceError::Storage(format!(
            "unsubscribe target {} not found",
            subscriber_id
        )));
    }

    info!(subscriber_id = %subscriber_id, "subscriber_unsubscribed");

    Ok(format!("{}/unsubscribe-success", site_url))
}
