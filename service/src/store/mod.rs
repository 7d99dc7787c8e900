//! Persistence port and domain records.
//!
//! The [`Store`] trait is the single seam between request handling and
//! storage. Concurrency safety is delegated to the adapter: conditional
//! updates and unique constraints, never in-process locks shared across
//! requests. [`postgres::PgStore`] is the production adapter;
//! [`memory::MemStore`] backs tests and local smoke runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::MemStore;
pub use postgres::PgStore;

/// A newsletter subscriber.
///
/// Created pending on subscribe, activated by confirmation, deactivated by
/// unsubscribe. The dispatch pipeline only reads active subscribers and
/// writes `last_sent_at`.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub confirmation_token: String,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub last_sent_at: Option<DateTime<Utc>>,
}

/// Feedback label. Exactly two values; a repeat vote replaces the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Like,
    Dislike,
}

impl FeedbackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }

    /// Parse the query-parameter form. Anything but the two exact labels is
    /// rejected.
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "like" => Some(Self::Like),
            "dislike" => Some(Self::Dislike),
            _ => None,
        }
    }
}

/// Persistence failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Unique email constraint hit on subscribe.
    #[error("email already subscribed")]
    DuplicateEmail,

    /// Query or mutation failed in the adapter.
    #[error("store query failed: {0}")]
    Query(String),
}

/// Port for subscriber, send-history, and feedback storage.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a pending subscriber. Fails with
    /// [`StoreError::DuplicateEmail`] when the email already exists.
    async fn insert_subscriber(
        &self,
        email: &str,
        confirmation_token: &str,
    ) -> Result<Subscriber, StoreError>;

    /// Confirm the subscriber holding this confirmation token, if any.
    ///
    /// Conditional update: only a subscriber with a matching token that has
    /// not yet confirmed transitions. Returns `None` for unknown or
    /// already-used tokens.
    async fn confirm_subscriber(
        &self,
        confirmation_token: &str,
    ) -> Result<Option<Subscriber>, StoreError>;

    /// All subscribers with `is_active = true`.
    async fn active_subscribers(&self) -> Result<Vec<Subscriber>, StoreError>;

    /// Set `is_active = false`. Returns whether a subscriber was updated.
    async fn deactivate_subscriber(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Record a successful delivery time for one subscriber.
    async fn mark_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Sayings sent at or after `since`, newest first.
    async fn recent_sayings(&self, since: DateTime<Utc>) -> Result<Vec<String>, StoreError>;

    /// `(saying, kind)` feedback pairs recorded at or after `since`.
    async fn feedback_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<(String, FeedbackKind)>, StoreError>;

    /// Append a send record for the chosen saying.
    async fn record_send(&self, saying: &str, cycle: i64) -> Result<(), StoreError>;

    /// Current cycle number from the external counter; 1 when the counter
    /// is absent.
    async fn current_cycle(&self) -> Result<i64, StoreError>;

    /// Insert or update the feedback row for `(subscriber, saying)` in one
    /// atomic operation.
    async fn upsert_feedback(
        &self,
        subscriber_id: Uuid,
        saying: &str,
        kind: FeedbackKind,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_kind_from_param() {
        assert_eq!(FeedbackKind::from_param("like"), Some(FeedbackKind::Like));
        assert_eq!(FeedbackKind::from_param("dislike"), Some(FeedbackKind::Dislike));
        assert_eq!(FeedbackKind::from_param("LIKE"), None);
        assert_eq!(FeedbackKind::from_param("meh"), None);
        assert_eq!(FeedbackKind::from_param(""), None);
    }
}
