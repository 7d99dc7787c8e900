//! In-memory adapter for the [`Store`] port.
//!
//! Same observable semantics as the Postgres adapter, backed by a
//! `tokio::sync::RwLock`. Used by the test suites and for local smoke runs
//! without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{FeedbackKind, Store, StoreError, Subscriber};

#[derive(Debug, Clone)]
struct FeedbackRow {
    subscriber_id: Uuid,
    saying: String,
    kind: FeedbackKind,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct SendRow {
    saying: String,
    cycle: i64,
    sent_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    subscribers: Vec<Subscriber>,
    sends: Vec<SendRow>,
    feedback: Vec<FeedbackRow>,
    cycle: Option<i64>,
}

/// RwLock-backed store.
#[derive(Default)]
pub struct MemStore {
    inner: RwLock<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an already-confirmed, active subscriber.
    pub async fn add_active_subscriber(&self, email: &str) -> Subscriber {
        let subscriber = Subscriber {
            id: Uuid::new_v4(),
            email: email.to_string(),
            is_active: true,
            confirmation_token: Uuid::new_v4().to_string(),
            confirmed_at: Some(Utc::now()),
            last_sent_at: None,
        };
        self.inner.write().await.subscribers.push(subscriber.clone());
        subscriber
    }

    /// Seed a send record with an explicit timestamp.
    pub async fn add_send_record(&self, saying: &str, cycle: i64, sent_at: DateTime<Utc>) {
        self.inner.write().await.sends.push(SendRow {
            saying: saying.to_string(),
            cycle,
            sent_at,
        });
    }

    pub async fn set_cycle(&self, cycle: i64) {
        self.inner.write().await.cycle = Some(cycle);
    }

    pub async fn subscriber(&self, id: Uuid) -> Option<Subscriber> {
        self.inner
            .read()
            .await
            .subscribers
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    /// All recorded sends as `(saying, cycle)` pairs, oldest first.
    pub async fn send_records(&self) -> Vec<(String, i64)> {
        self.inner
            .read()
            .await
            .sends
            .iter()
            .map(|s| (s.saying.clone(), s.cycle))
            .collect()
    }

    /// All feedback rows as `(subscriber_id, saying, kind)`, oldest first.
    pub async fn feedback_rows(&self) -> Vec<(Uuid, String, FeedbackKind)> {
        self.inner
            .read()
            .await
            .feedback
            .iter()
            .map(|f| (f.subscriber_id, f.saying.clone(), f.kind))
            .collect()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn insert_subscriber(
        &self,
        email: &str,
        confirmation_token: &str,
    ) -> Result<Subscriber, StoreError> {
        let mut inner = self.inner.write().await;

        if inner.subscribers.iter().any(|s| s.email == email) {
            return Err(StoreError::DuplicateEmail);
        }

        let subscriber = Subscriber {
            id: Uuid::new_v4(),
            email: email.to_string(),
            is_active: false,
            confirmation_token: confirmation_token.to_string(),
            confirmed_at: None,
            last_sent_at: None,
        };
        inner.subscribers.push(subscriber.clone());
        Ok(subscriber)
    }

    async fn confirm_subscriber(
        &self,
        confirmation_token: &str,
    ) -> Result<Option<Subscriber>, StoreError> {
        let mut inner = self.inner.write().await;

        let subscriber = inner
            .subscribers
            .iter_mut()
            .find(|s| s.confirmation_token == confirmation_token && s.confirmed_at.is_none());

        Ok(subscriber.map(|s| {
            s.confirmed_at = Some(Utc::now());
            s.is_active = true;
            s.clone()
        }))
    }

    async fn active_subscribers(&self) -> Result<Vec<Subscriber>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .subscribers
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }

    async fn deactivate_subscriber(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.subscribers.iter_mut().find(|s| s.id == id) {
            Some(subscriber) => {
                subscriber.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(subscriber) = inner.subscribers.iter_mut().find(|s| s.id == id) {
            subscriber.last_sent_at = Some(at);
        }
        Ok(())
    }

    async fn recent_sayings(&self, since: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<&SendRow> = inner.sends.iter().filter(|s| s.sent_at >= since).collect();
        rows.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Ok(rows.into_iter().map(|s| s.saying.clone()).collect())
    }

    async fn feedback_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<(String, FeedbackKind)>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .feedback
            .iter()
            .filter(|f| f.created_at >= since)
            .map(|f| (f.saying.clone(), f.kind))
            .collect())
    }

    async fn record_send(&self, saying: &str, cycle: i64) -> Result<(), StoreError> {
        self.inner.write().await.sends.push(SendRow {
            saying: saying.to_string(),
            cycle,
            sent_at: Utc::now(),
        });
        Ok(())
    }

    async fn current_cycle(&self) -> Result<i64, StoreError> {
        Ok(self.inner.read().await.cycle.unwrap_or(1))
    }

    async fn upsert_feedback(
        &self,
        subscriber_id: Uuid,
        saying: &str,
        kind: FeedbackKind,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        match inner
            .feedback
            .iter_mut()
            .find(|f| f.subscriber_id == subscriber_id && f.saying == saying)
        {
            Some(row) => row.kind = kind,
            None => inner.feedback.push(FeedbackRow {
                subscriber_id,
                saying: saying.to_string(),
                kind,
                created_at: Utc::now(),
            }),
        }
        Ok(())
    }
}
