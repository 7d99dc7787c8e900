//! Daily dispatch pipeline - one etymology fanned out to every active
//! subscriber.
//!
//! One run: load the active subscriber set, derive the 30-day novelty and
//! preference windows, obtain one fresh etymology, record it as used, then
//! scatter/gather the per-subscriber sends. Each send owns its own token
//! minting, rendering, and transport call; a failure in one never touches
//! another. The aggregate report is data, not an error, even at 100%
//! delivery failure.

use chrono::{Duration, Utc};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::content::{ContentProvider, Etymology};
use crate::error::ServiceError;
use crate::mail::MailTransport;
use crate::render;
use crate::store::{FeedbackKind, Store, Subscriber};
use crate::token::TokenCodec;

/// Exclusion and feedback-bias window.
const LOOKBACK_DAYS: i64 = 30;

/// Aggregate result of one dispatch run.
#[derive(Debug, serde::Serialize)]
pub struct DispatchReport {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etymology: Option<String>,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

/// Run one dispatch cycle.
///
/// A content-provider or storage failure before fan-out aborts the whole
/// run; per-subscriber send failures are isolated and only counted.
pub async fn run_dispatch(
    store: &dyn Store,
    provider: &dyn ContentProvider,
    mailer: &dyn MailTransport,
    codec: &TokenCodec,
    config: &Config,
) -> Result<DispatchReport, ServiceError> {
    info!("dispatch_start");

    let subscribers = store.active_subscribers().await?;
    if subscribers.is_empty() {
        info!("dispatch_no_active_subscribers");
        return Ok(DispatchReport {
            message: "No active subscribers".to_string(),
            etymology: None,
            total: 0,
            success: 0,
            failed: 0,
        });
    }

    let since = Utc::now() - Duration::days(LOOKBACK_DAYS);
    let recent = store.recent_sayings(since).await?;

    let mut liked = Vec::new();
    let mut disliked = Vec::new();
    for (saying, kind) in store.feedback_since(since).await? {
        match kind {
            FeedbackKind::Like => liked.push(saying),
            FeedbackKind::Dislike => disliked.push(saying),
        }
    }

    info!(
        subscriber_count = subscribers.len(),
        recent_count = recent.len(),
        liked_count = liked.len(),
        disliked_count = disliked.len(),
        "dispatch_context_loaded"
    );

    let etymology = provider.generate(&recent, &liked, &disliked).await?;

    // Record the saying as used BEFORE any delivery is attempted. A naive
    // same-day retry after a partial or total send failure must not
    // re-select this item: novelty wins over delivery completeness.
    let cycle = store.current_cycle().await?;
    store.record_send(&etymology.saying, cycle).await?;

    info!(saying = %etymology.saying, cycle = cycle, "dispatch_send_recorded");

    let sends = subscribers
        .iter()
        .map(|subscriber| send_to_subscriber(store, mailer, codec, config, &etymology, subscriber));
    let results = futures::future::join_all(sends).await;

    let total = subscribers.len();
    let success = results.iter().filter(|&&delivered| delivered).count();
    let failed = total - success;

    info!(
        saying = %etymology.saying,
        total = total,
        success = success,
        failed = failed,
        "dispatch_complete"
    );

    Ok(DispatchReport {
        message: "Daily etymology emails sent".to_string(),
        etymology: Some(etymology.saying),
        total,
        success,
        failed,
    })
}

/// Render and deliver to one subscriber. Owns its own token minting and
/// transport call; returns whether delivery succeeded.
async fn send_to_subscriber(
    store: &dyn Store,
    mailer: &dyn MailTransport,
    codec: &TokenCodec,
    config: &Config,
    etymology: &Etymology,
    subscriber: &Subscriber,
) -> bool {
    let subscriber_id = subscriber.id.to_string();
    let feedback_token = codec.issue_feedback(&subscriber_id, &etymology.saying);
    let unsubscribe_token = codec.issue_unsubscribe(&subscriber_id);

    let like_url = render::feedback_url(
        &config.public_api_url,
        &feedback_token,
        &etymology.saying,
        "like",
    );
    let dislike_url = render::feedback_url(
        &config.public_api_url,
        &feedback_token,
        &etymology.saying,
        "dislike",
    );
    let unsubscribe = render::unsubscribe_url(&config.public_api_url, &unsubscribe_token);

    let html = render::daily_email_html(etymology, &like_url, &dislike_url, &unsubscribe);
    let subject = render::daily_subject(&etymology.saying);

    match mailer.send(&subscriber.email, &subject, &html).await {
        Ok(()) => {
            if let Err(e) = store.mark_sent(subscriber.id, Utc::now()).await {
                warn!(email = %subscriber.email, error = %e, "dispatch_mark_sent_failed");
            }
            info!(email = %subscriber.email, "dispatch_subscriber_sent");
            true
        }
        Err(e) => {
            error!(email = %subscriber.email, error = %e, "dispatch_subscriber_failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentError;
    use crate::mail::MailError;
    use crate::store::MemStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn test_config() -> Config {
        Config {
            token_secret: "test-secret".to_string(),
            site_url: "https://example.com".to_string(),
            database_url: "postgres://unused".to_string(),
            resend_api_key: "unused".to_string(),
            google_ai_api_key: "unused".to_string(),
            public_api_url: "https://api.example.com".to_string(),
            email_from: "Etymology Daily <test@example.com>".to_string(),
            port: 8080,
            request_timeout_ms: 1000,
            dispatch_auth_token: None,
        }
    }

    fn sample_etymology() -> Etymology {
        Etymology {
            saying: "break the ice".to_string(),
            origin: "Ships once broke ice to open trade routes.".to_string(),
            meaning: "To ease initial social tension.".to_string(),
            era: "16th Century".to_string(),
        }
    }

    /// Records the constraint sets it was handed; returns a fixed record.
    #[derive(Default)]
    struct StubProvider {
        calls: Mutex<Vec<(Vec<String>, Vec<String>, Vec<String>)>>,
    }

    #[async_trait]
    impl ContentProvider for StubProvider {
        async fn generate(
            &self,
            recent: &[String],
            liked: &[String],
            disliked: &[String],
        ) -> Result<Etymology, ContentError> {
            self.calls.lock().unwrap().push((
                recent.to_vec(),
                liked.to_vec(),
                disliked.to_vec(),
            ));
            Ok(sample_etymology())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ContentProvider for FailingProvider {
        async fn generate(
            &self,
            _recent: &[String],
            _liked: &[String],
            _disliked: &[String],
        ) -> Result<Etymology, ContentError> {
            Err(ContentError::Empty)
        }
    }

    /// Captures deliveries; fails for the configured recipients.
    #[derive(Default)]
    struct StubMailer {
        fail_for: Vec<String>,
        sent: Mutex<Vec<(String, String, String)>>,
    }

    impl StubMailer {
        fn failing_for(emails: &[&str]) -> Self {
            Self {
                fail_for: emails.iter().map(|e| e.to_string()).collect(),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MailTransport for StubMailer {
        async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
            if self.fail_for.iter().any(|e| e == to) {
                return Err(MailError::Status {
                    status: 500,
                    body: "stub failure".to_string(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), html.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_zero_subscribers_short_circuits_without_provider_call() {
        let store = MemStore::new();
        let provider = StubProvider::default();
        let mailer = StubMailer::default();
        let codec = TokenCodec::new("test-secret");

        let report = run_dispatch(&store, &provider, &mailer, &codec, &test_config())
            .await
            .unwrap();

        assert_eq!(report.message, "No active subscribers");
        assert_eq!(report.etymology, None);
        assert_eq!((report.total, report.success, report.failed), (0, 0, 0));
        assert!(provider.calls.lock().unwrap().is_empty());
        assert!(store.send_records().await.is_empty());
    }

    #[tokio::test]
    async fn test_per_subscriber_failure_is_isolated() {
        let store = MemStore::new();
        let mut subscribers = Vec::new();
        for i in 1..=5 {
            subscribers.push(
                store
                    .add_active_subscriber(&format!("sub{}@example.com", i))
                    .await,
            );
        }

        let provider = StubProvider::default();
        let mailer = StubMailer::failing_for(&["sub3@example.com"]);
        let codec = TokenCodec::new("test-secret");

        let report = run_dispatch(&store, &provider, &mailer, &codec, &test_config())
            .await
            .unwrap();

        assert_eq!((report.total, report.success, report.failed), (5, 4, 1));
        assert_eq!(report.etymology.as_deref(), Some("break the ice"));

        for subscriber in &subscribers {
            let stored = store.subscriber(subscriber.id).await.unwrap();
            if subscriber.email == "sub3@example.com" {
                assert!(stored.last_sent_at.is_none());
            } else {
                assert!(stored.last_sent_at.is_some());
            }
        }
    }

    #[tokio::test]
    async fn test_exclusion_and_bias_sets_reach_the_provider() {
        let store = MemStore::new();
        store.add_active_subscriber("sub@example.com").await;

        let now = Utc::now();
        store.add_send_record("fresh saying", 1, now - Duration::days(3)).await;
        store.add_send_record("stale saying", 1, now - Duration::days(45)).await;

        let voter = store.add_active_subscriber("voter@example.com").await;
        store
            .upsert_feedback(voter.id, "loved one", FeedbackKind::Like)
            .await
            .unwrap();
        store
            .upsert_feedback(voter.id, "hated one", FeedbackKind::Dislike)
            .await
            .unwrap();

        let provider = StubProvider::default();
        let mailer = StubMailer::default();
        let codec = TokenCodec::new("test-secret");

        run_dispatch(&store, &provider, &mailer, &codec, &test_config())
            .await
            .unwrap();

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (recent, liked, disliked) = &calls[0];
        assert_eq!(recent, &vec!["fresh saying".to_string()]);
        assert_eq!(liked, &vec!["loved one".to_string()]);
        assert_eq!(disliked, &vec!["hated one".to_string()]);
    }

    #[tokio::test]
    async fn test_send_record_persists_even_when_every_delivery_fails() {
        let store = MemStore::new();
        store.add_active_subscriber("a@example.com").await;
        store.add_active_subscriber("b@example.com").await;
        store.set_cycle(3).await;

        let provider = StubProvider::default();
        let mailer = StubMailer::failing_for(&["a@example.com", "b@example.com"]);
        let codec = TokenCodec::new("test-secret");

        let report = run_dispatch(&store, &provider, &mailer, &codec, &test_config())
            .await
            .unwrap();

        assert_eq!((report.total, report.success, report.failed), (2, 0, 2));
        // The item is burned regardless of delivery outcome
        assert_eq!(
            store.send_records().await,
            vec![("break the ice".to_string(), 3)]
        );
    }

    #[tokio::test]
    async fn test_provider_failure_aborts_run_before_any_send() {
        let store = MemStore::new();
        store.add_active_subscriber("a@example.com").await;

        let mailer = StubMailer::default();
        let codec = TokenCodec::new("test-secret");

        let result = run_dispatch(&store, &FailingProvider, &mailer, &codec, &test_config()).await;

        assert!(matches!(result, Err(ServiceError::Upstream(_))));
        assert!(store.send_records().await.is_empty());
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rendered_email_carries_working_action_tokens() {
        let store = MemStore::new();
        let subscriber = store.add_active_subscriber("a@example.com").await;

        let provider = StubProvider::default();
        let mailer = StubMailer::default();
        let codec = TokenCodec::new("test-secret");

        run_dispatch(&store, &provider, &mailer, &codec, &test_config())
            .await
            .unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (to, subject, html) = &sent[0];
        assert_eq!(to, "a@example.com");
        assert!(subject.contains("break the ice"));
        assert!(html.contains("https://api.example.com/feedback?token="));
        assert!(html.contains("https://api.example.com/unsubscribe?token="));

        // The embedded feedback token verifies against the saying it was
        // minted for, and decodes to this subscriber.
        let token_start = html.find("/feedback?token=").unwrap() + "/feedback?token=".len();
        let token_end = html[token_start..].find('&').unwrap() + token_start;
        let token = &html[token_start..token_end];
        assert_eq!(
            codec.verify_feedback(token, "break the ice"),
            Some(subscriber.id.to_string())
        );
    }
}
