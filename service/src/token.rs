//! Signed action tokens for feedback and unsubscribe links.
//!
//! A token authorizes exactly one action for one subscriber without any
//! server-side session or issued-token table: validity is recomputed from
//! the token itself on every verification. Format:
//!
//! ```text
//! {subscriber_id}.{issued_at_millis}.{signature}
//! ```
//!
//! The signature is the hex HMAC-SHA256 digest of
//! `{subscriber_id}.{issued_at_millis}.{context}` under the shared secret.
//! For feedback tokens the context is the saying text itself, so a token
//! minted for one saying cannot be replayed against another. Unsubscribe
//! tokens use a fixed context tag and never expire: unsubscribe links in
//! old emails must keep working.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Context tag that scopes a token to the unsubscribe action family.
const UNSUBSCRIBE_CONTEXT: &str = "unsubscribe";

/// Maximum accepted age for feedback tokens.
const FEEDBACK_TOKEN_MAX_AGE_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// Issues and verifies HMAC-signed action tokens.
#[derive(Clone)]
pub struct TokenCodec {
    secret: String,
}

impl TokenCodec {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Mint a feedback token bound to one saying.
    pub fn issue_feedback(&self, subscriber_id: &str, saying: &str) -> String {
        self.issue(subscriber_id, saying)
    }

    /// Mint an unsubscribe token.
    pub fn issue_unsubscribe(&self, subscriber_id: &str) -> String {
        self.issue(subscriber_id, UNSUBSCRIBE_CONTEXT)
    }

    /// Verify a feedback token against the saying it was minted for.
    ///
    /// Returns the subscriber id when the signature matches and the token is
    /// at most seven days old.
    pub fn verify_feedback(&self, token: &str, saying: &str) -> Option<String> {
        self.verify(token, saying, Some(FEEDBACK_TOKEN_MAX_AGE_MS))
    }

    /// Verify an unsubscribe token. Not time-limited.
    pub fn verify_unsubscribe(&self, token: &str) -> Option<String> {
        self.verify(token, UNSUBSCRIBE_CONTEXT, None)
    }

    fn issue(&self, subject_id: &str, context: &str) -> String {
        let issued_at = now_millis();
        let signature = self.sign(subject_id, issued_at, context);
        format!("{}.{}.{}", subject_id, issued_at, signature)
    }

    /// Recompute the signature and compare in constant time, then apply the
    /// age bound if one is given. Any malformed input is invalid; this never
    /// panics on attacker-controlled tokens.
    fn verify(&self, token: &str, context: &str, max_age_ms: Option<u64>) -> Option<String> {
        let fields: Vec<&str> = token.split('.').collect();
        if fields.len() != 3 {
            warn!(field_count = fields.len(), "action_token_malformed");
            return None;
        }
        let (subject_id, issued_at_raw, signature) = (fields[0], fields[1], fields[2]);

        if subject_id.is_empty() || issued_at_raw.is_empty() || signature.is_empty() {
            warn!("action_token_empty_field");
            return None;
        }

        let issued_at: u64 = match issued_at_raw.parse() {
            Ok(t) => t,
            Err(_) => {
                warn!("action_token_invalid_timestamp");
                return None;
            }
        };

        let signature_bytes = match hex::decode(signature) {
            Ok(b) => b,
            Err(_) => {
                warn!("action_token_invalid_signature_encoding");
                return None;
            }
        };

        let mut mac = self.mac();
        mac.update(message(subject_id, issued_at, context).as_bytes());
        if mac.verify_slice(&signature_bytes).is_err() {
            warn!("action_token_signature_mismatch");
            return None;
        }

        if let Some(max_age) = max_age_ms {
            let age = now_millis().saturating_sub(issued_at);
            if age > max_age {
                warn!(age_ms = age, max_age_ms = max_age, "action_token_expired");
                return None;
            }
        }

        Some(subject_id.to_string())
    }

    fn sign(&self, subject_id: &str, issued_at: u64, context: &str) -> String {
        let mut mac = self.mac();
        mac.update(message(subject_id, issued_at, context).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length
        HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC key")
    }
}

fn message(subject_id: &str, issued_at: u64, context: &str) -> String {
    format!("{}.{}.{}", subject_id, issued_at, context)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAYING: &str = "bite the bullet";

    fn codec() -> TokenCodec {
        TokenCodec::new("test-signing-secret")
    }

    fn feedback_token_issued_at(codec: &TokenCodec, id: &str, issued_at: u64) -> String {
        let signature = codec.sign(id, issued_at, SAYING);
        format!("{}.{}.{}", id, issued_at, signature)
    }

    #[test]
    fn test_feedback_round_trip() {
        let codec = codec();
        let token = codec.issue_feedback("sub-123", SAYING);
        assert_eq!(codec.verify_feedback(&token, SAYING), Some("sub-123".to_string()));
    }

    #[test]
    fn test_unsubscribe_round_trip() {
        let codec = codec();
        let token = codec.issue_unsubscribe("sub-123");
        assert_eq!(codec.verify_unsubscribe(&token), Some("sub-123".to_string()));
    }

    #[test]
    fn test_feedback_token_bound_to_saying() {
        let codec = codec();
        let token = codec.issue_feedback("sub-123", "saying A");
        assert!(codec.verify_feedback(&token, "saying B").is_none());
    }

    #[test]
    fn test_action_families_do_not_cross() {
        let codec = codec();
        let unsubscribe = codec.issue_unsubscribe("sub-123");
        assert!(codec.verify_feedback(&unsubscribe, SAYING).is_none());

        let feedback = codec.issue_feedback("sub-123", SAYING);
        assert!(codec.verify_unsubscribe(&feedback).is_none());
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let codec = codec();
        let token = codec.issue_feedback("sub-123", SAYING);

        // Corrupt the last signature character
        let mut tampered = token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == '0' { '1' } else { '0' });

        assert!(codec.verify_feedback(&tampered, SAYING).is_none());
    }

    #[test]
    fn test_tampered_subject_rejected() {
        let codec = codec();
        let token = codec.issue_feedback("sub-123", SAYING);
        let forged = token.replacen("sub-123", "sub-456", 1);
        assert!(codec.verify_feedback(&forged, SAYING).is_none());
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let codec = codec();
        for token in ["", "justonefield", "two.fields", "a.b.c.d", "..", "sub..sig"] {
            assert!(codec.verify_feedback(token, SAYING).is_none(), "accepted {:?}", token);
            assert!(codec.verify_unsubscribe(token).is_none(), "accepted {:?}", token);
        }
    }

    #[test]
    fn test_non_numeric_timestamp_rejected() {
        let codec = codec();
        let signature = codec.sign("sub-123", 0, SAYING);
        let token = format!("sub-123.notatime.{}", signature);
        assert!(codec.verify_feedback(&token, SAYING).is_none());
    }

    #[test]
    fn test_non_hex_signature_rejected() {
        let codec = codec();
        let token = format!("sub-123.{}.zzzz", now_millis());
        assert!(codec.verify_feedback(&token, SAYING).is_none());
    }

    #[test]
    fn test_feedback_token_expires_after_seven_days() {
        let codec = codec();
        let eight_days_ago = now_millis() - 8 * 24 * 60 * 60 * 1000;
        let token = feedback_token_issued_at(&codec, "sub-123", eight_days_ago);
        assert!(codec.verify_feedback(&token, SAYING).is_none());
    }

    #[test]
    fn test_feedback_token_valid_just_inside_window() {
        let codec = codec();
        let six_days_23h_ago = now_millis() - (6 * 24 + 23) * 60 * 60 * 1000;
        let token = feedback_token_issued_at(&codec, "sub-123", six_days_23h_ago);
        assert_eq!(codec.verify_feedback(&token, SAYING), Some("sub-123".to_string()));
    }

    #[test]
    fn test_unsubscribe_token_never_expires() {
        let codec = codec();
        let a_year_ago = now_millis() - 365 * 24 * 60 * 60 * 1000;
        let signature = codec.sign("sub-123", a_year_ago, UNSUBSCRIBE_CONTEXT);
        let token = format!("sub-123.{}.{}", a_year_ago, signature);
        assert_eq!(codec.verify_unsubscribe(&token), Some("sub-123".to_string()));
    }

    #[test]
    fn test_different_secrets_do_not_verify() {
        let token = TokenCodec::new("secret-a").issue_feedback("sub-123", SAYING);
        assert!(TokenCodec::new("secret-b").verify_feedback(&token, SAYING).is_none());
    }
}
