use std::time::Duration;

use axum::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{Mailer, OutboundEmail};
use crate::config::ResendConfig;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("RESEND_API_KEY or AUTH_EMAIL_FROM not configured")]
    NotConfigured,
    #[error("email provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("email provider rejected message: {status}")]
    Rejected { status: u16, body: String },
}

lazy_static! {
    static ref TOKEN_PARAM_RE: Regex = Regex::new(r#"token=[^&\s"<]+"#).unwrap();
}

/// Raw token secrets must not reach the logs, even in previews.
fn redact_tokens(text: &str) -> String {
    TOKEN_PARAM_RE.replace_all(text, "token=[redacted]").into_owned()
}

#[derive(Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// Resend HTTP API client. Without credentials it only traces the message.
#[derive(Clone)]
pub struct ResendMailer {
    http: reqwest::Client,
    config: ResendConfig,
}

impl ResendMailer {
    pub fn new(config: ResendConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, config })
    }

    pub async fn deliver(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        let (Some(api_key), Some(from)) = (&self.config.api_key, &self.config.email_from) else {
            return Err(DeliveryError::NotConfigured);
        };

        let res = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&ResendPayload {
                from,
                to: &email.to,
                subject: &email.subject,
                html: &email.html,
                text: &email.text,
            })
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutboundEmail) -> bool {
        match self.deliver(email).await {
            Ok(()) => {
                info!(subject = %email.subject, "auth email sent");
                true
            }
            Err(DeliveryError::NotConfigured) => {
                warn!(subject = %email.subject, "email provider not configured; message not sent");
                debug!(text = %redact_tokens(&email.text), "email preview");
                false
            }
            Err(DeliveryError::Rejected { status, body }) => {
                warn!(status, body = %body, "email provider rejected message");
                false
            }
            Err(e) => {
                warn!(error = %e, "email delivery failed");
                false
            }
        }
    }
}
