//! Notification dispatcher: verification and reset links over a
//! transactional email provider.

use axum::async_trait;
use serde::Serialize;

mod resend;
pub mod templates;

pub use resend::{DeliveryError, ResendMailer};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// `send` reports whether the message was handed to the provider. It never
/// fails the caller; `false` means the link was not emailed.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> bool;
}

/// Turns relative paths into absolute links on the configured base URL.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    base: String,
}

impl LinkBuilder {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn absolute(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base, path)
        } else {
            format!("{}/{}", self.base, path)
        }
    }
}
