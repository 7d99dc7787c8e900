//! Outbound email via the Resend HTTP API.
//!
//! [`MailTransport`] is the seam the dispatch pipeline and the subscription
//! flow send through; [`ResendMailer`] is the production implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

/// Mail transport failure for a single message.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("mail provider returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Port for the outbound mail provider.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Send one HTML email. Errors are scoped to this message only.
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError>;
}

const SEND_URL: &str = "https://api.resend.com/emails";

/// Resend API client.
pub struct ResendMailer {
    client: Client,
    api_key: String,
    from: String,
    timeout: Duration,
}

impl ResendMailer {
    pub fn new(client: Client, api_key: String, from: String, timeout: Duration) -> Self {
        Self {
            client,
            api_key,
            from,
            timeout,
        }
    }
}

#[async_trait]
impl MailTransport for ResendMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        let response = self
            .client
            .post(SEND_URL)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                to = %to,
                status = status.as_u16(),
                "mail_send_rejected"
            );
            return Err(MailError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(to = %to, "mail_sent");
        Ok(())
    }
}
