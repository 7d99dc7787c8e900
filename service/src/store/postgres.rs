//! PostgreSQL adapter for the [`Store`] port.
//!
//! Targets the original tables: `subscribers`, `etymology_sends`, and
//! `etymology_feedback`. Idempotence and race safety live in the SQL:
//! conditional updates for confirmation, a unique `(subscriber_id,
//! etymology_saying)` constraint with `ON CONFLICT DO UPDATE` for feedback.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use super::{FeedbackKind, Store, StoreError, Subscriber};

type SubscriberRow = (
    Uuid,
    String,
    bool,
    String,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
);

const SUBSCRIBER_COLUMNS: &str =
    "id, email, is_active, confirmation_token, confirmed_at, last_sent_at";

/// `sqlx::PgPool`-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with the given connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(Self::new(pool))
    }
}

fn subscriber_from_row(row: SubscriberRow) -> Subscriber {
    let (id, email, is_active, confirmation_token, confirmed_at, last_sent_at) = row;
    Subscriber {
        id,
        email,
        is_active,
        confirmation_token,
        confirmed_at,
        last_sent_at,
    }
}

fn query_error(e: sqlx::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

#[async_trait]
impl Store for PgStore {
    async fn insert_subscriber(
        &self,
        email: &str,
        confirmation_token: &str,
    ) -> Result<Subscriber, StoreError> {
        let row = sqlx::query_as::<_, SubscriberRow>(&format!(
            "INSERT INTO subscribers (email, confirmation_token, is_active) \
             VALUES ($1, $2, FALSE) RETURNING {}",
            SUBSCRIBER_COLUMNS
        ))
        .bind(email)
        .bind(confirmation_token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
            _ => query_error(e),
        })?;

        Ok(subscriber_from_row(row))
    }

    async fn confirm_subscriber(
        &self,
        confirmation_token: &str,
    ) -> Result<Option<Subscriber>, StoreError> {
        let row = sqlx::query_as::<_, SubscriberRow>(&format!(
            "UPDATE subscribers SET confirmed_at = NOW(), is_active = TRUE \
             WHERE confirmation_token = $1 AND confirmed_at IS NULL \
             RETURNING {}",
            SUBSCRIBER_COLUMNS
        ))
        .bind(confirmation_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(row.map(subscriber_from_row))
    }

    async fn active_subscribers(&self) -> Result<Vec<Subscriber>, StoreError> {
        let rows = sqlx::query_as::<_, SubscriberRow>(&format!(
            "SELECT {} FROM subscribers WHERE is_active = TRUE",
            SUBSCRIBER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(rows.into_iter().map(subscriber_from_row).collect())
    }

    async fn deactivate_subscriber(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE subscribers SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE subscribers SET last_sent_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;

        Ok(())
    }

    async fn recent_sayings(&self, since: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar::<_, String>(
            "SELECT etymology_saying FROM etymology_sends \
             WHERE sent_at >= $1 ORDER BY sent_at DESC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)
    }

    async fn feedback_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<(String, FeedbackKind)>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT etymology_saying, feedback_type FROM etymology_feedback \
             WHERE created_at >= $1",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(rows
            .into_iter()
            .filter_map(|(saying, kind)| match FeedbackKind::from_param(&kind) {
                Some(kind) => Some((saying, kind)),
                None => {
                    warn!(feedback_type = %kind, "feedback_row_unknown_kind");
                    None
                }
            })
            .collect())
    }

    async fn record_send(&self, saying: &str, cycle: i64) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO etymology_sends (etymology_saying, cycle_number) VALUES ($1, $2)",
        )
        .bind(saying)
        .bind(cycle)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn current_cycle(&self) -> Result<i64, StoreError> {
        // Counter lives in the database; a missing or null counter means
        // the first cycle, matching the original behavior.
        match sqlx::query_scalar::<_, Option<i64>>("SELECT get_current_etymology_cycle()")
            .fetch_one(&self.pool)
            .await
        {
            Ok(Some(cycle)) => Ok(cycle),
            Ok(None) => Ok(1),
            Err(e) => {
                warn!(error = %e, "cycle_counter_unavailable");
                Ok(1)
            }
        }
    }

    async fn upsert_feedback(
        &self,
        subscriber_id: Uuid,
        saying: &str,
        kind: FeedbackKind,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO etymology_feedback (subscriber_id, etymology_saying, feedback_type) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (subscriber_id, etymology_saying) \
             DO UPDATE SET feedback_type = EXCLUDED.feedback_type",
        )
        .bind(subscriber_id)
        .bind(saying)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(())
    }
}
