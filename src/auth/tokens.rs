//! Single-use tokens for email verification and password reset.
//!
//! Only the SHA-256 of the raw secret is stored; the raw value goes out in
//! the emailed link and is the sole proof of authorization.

use std::sync::Arc;

use anyhow::Context;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::TokenConfig;
use crate::error::AuthError;
use crate::store::{AuthStore, Consumption, NewToken, TokenKind};

const TOKEN_BYTES: usize = 32;

/// 256 bits from the OS RNG, hex encoded.
pub fn generate_raw_token() -> anyhow::Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate token")?;
    Ok(hex::encode(bytes))
}

pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<dyn AuthStore>,
    policy: TokenConfig,
}

impl TokenIssuer {
    pub fn new(store: Arc<dyn AuthStore>, policy: TokenConfig) -> Self {
        Self { store, policy }
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::EmailVerification => Duration::hours(self.policy.verification_ttl_hours),
            TokenKind::PasswordReset => Duration::minutes(self.policy.reset_ttl_minutes),
        }
    }

    /// Issue a token with the configured lifetime for `kind`.
    pub async fn issue(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        email: &str,
    ) -> Result<String, AuthError> {
        self.issue_with_ttl(kind, user_id, email, self.ttl(kind)).await
    }

    /// Returns the raw secret. Callers put it in a link and drop it.
    pub async fn issue_with_ttl(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        email: &str,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        if self.policy.revoke_prior {
            let revoked = self.store.revoke_outstanding_tokens(kind, user_id).await?;
            if revoked > 0 {
                debug!(%user_id, %kind, revoked, "revoked outstanding tokens");
            }
        }

        let raw = generate_raw_token()?;
        self.store
            .insert_token(
                kind,
                NewToken {
                    user_id,
                    email: email.to_string(),
                    token_hash: hash_token(&raw),
                    expires_at: OffsetDateTime::now_utc() + ttl,
                },
            )
            .await?;
        info!(%user_id, %kind, "token issued");
        Ok(raw)
    }

    /// `Ok(None)` for unknown, expired and reused tokens alike.
    pub async fn verify_and_consume(
        &self,
        raw: &str,
        effect: Consumption,
    ) -> Result<Option<Uuid>, AuthError> {
        let kind = effect.kind();
        let consumed = self.store.consume_token(&hash_token(raw), effect).await?;
        match consumed {
            Some(user_id) => info!(%user_id, %kind, "token consumed"),
            None => debug!(%kind, "token rejected"),
        }
        Ok(consumed)
    }
}
