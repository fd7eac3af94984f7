use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AuthProvider, AuthStore, Consumption, NewCredentialsUser, NewToken, OAuthProfile, StoreError,
    TokenKind, User,
};

#[derive(Debug, Clone)]
struct TokenRecord {
    kind: TokenKind,
    user_id: Uuid,
    expires_at: OffsetDateTime,
    used_at: Option<OffsetDateTime>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    by_email: HashMap<String, Uuid>,
    // keyed by (kind, token_hash); hashes are unique per table
    tokens: HashMap<(TokenKind, String), TokenRecord>,
}

/// In-process store. Every operation runs under one lock, which gives the
/// same atomicity the Postgres store gets from its transactions.
#[derive(Default)]
pub struct MemoryAuthStore {
    inner: Mutex<Inner>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.inner.lock().await.users.len()
    }

    pub async fn token_count(&self, kind: TokenKind) -> usize {
        self.inner
            .lock()
            .await
            .tokens
            .values()
            .filter(|t| t.kind == kind)
            .count()
    }
}

#[async_trait]
impl AuthStore for MemoryAuthStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .by_email
            .get(email)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn create_credentials_user(&self, new: NewCredentialsUser) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.by_email.contains_key(&new.email) {
            return Err(StoreError::Conflict);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: Some(new.name),
            email: new.email,
            password_hash: Some(new.password_hash),
            image_url: None,
            auth_provider: AuthProvider::Credentials,
            provider_account_id: None,
            email_verified: None,
            created_at: now,
            updated_at: now,
            last_login_at: now,
        };
        inner.by_email.insert(user.email.clone(), user.id);
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn upsert_oauth_user(&self, profile: OAuthProfile) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().await;
        let now = OffsetDateTime::now_utc();

        if let Some(id) = inner.by_email.get(&profile.email).copied() {
            let user = inner
                .users
                .get_mut(&id)
                .ok_or_else(|| StoreError::InvalidRow(format!("dangling email index for {id}")))?;
            if profile.name.is_some() {
                user.name = profile.name;
            }
            if profile.image_url.is_some() {
                user.image_url = profile.image_url;
            }
            if profile.provider_account_id.is_some() {
                user.provider_account_id = profile.provider_account_id;
            }
            user.email_verified = user.email_verified.or(profile.email_verified);
            user.auth_provider = profile.provider;
            user.updated_at = now;
            user.last_login_at = now;
            return Ok(user.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            name: profile.name,
            email: profile.email,
            password_hash: None,
            image_url: profile.image_url,
            auth_provider: profile.provider,
            provider_account_id: profile.provider_account_id,
            email_verified: profile.email_verified,
            created_at: now,
            updated_at: now,
            last_login_at: now,
        };
        inner.by_email.insert(user.email.clone(), user.id);
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_password_hash(&self, user_id: Uuid, hash: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.password_hash = Some(hash.to_string());
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(user) = inner.users.get_mut(&user_id) {
            let now = OffsetDateTime::now_utc();
            user.email_verified = user.email_verified.or(Some(now));
            user.updated_at = now;
        }
        Ok(())
    }

    async fn insert_token(&self, kind: TokenKind, token: NewToken) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.users.contains_key(&token.user_id) {
            return Err(StoreError::InvalidRow(format!(
                "token owner {} does not exist",
                token.user_id
            )));
        }
        let key = (kind, token.token_hash);
        if inner.tokens.contains_key(&key) {
            return Err(StoreError::InvalidRow("duplicate token_hash".into()));
        }
        inner.tokens.insert(
            key,
            TokenRecord {
                kind,
                user_id: token.user_id,
                expires_at: token.expires_at,
                used_at: None,
            },
        );
        Ok(())
    }

    async fn revoke_outstanding_tokens(
        &self,
        kind: TokenKind,
        user_id: Uuid,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let now = OffsetDateTime::now_utc();
        let mut revoked = 0;
        for t in inner.tokens.values_mut() {
            if t.kind == kind && t.user_id == user_id && t.used_at.is_none() {
                t.used_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn consume_token(
        &self,
        token_hash: &str,
        effect: Consumption,
    ) -> Result<Option<Uuid>, StoreError> {
        let mut inner = self.inner.lock().await;
        let now = OffsetDateTime::now_utc();

        let key = (effect.kind(), token_hash.to_string());
        let user_id = match inner.tokens.get(&key) {
            Some(t) if t.used_at.is_none() && t.expires_at > now => t.user_id,
            _ => return Ok(None),
        };
        // Check the side effect target before mutating anything so a failure
        // leaves the token unused.
        let Some(user) = inner.users.get_mut(&user_id) else {
            return Err(StoreError::InvalidRow(format!("token owner {user_id} missing")));
        };
        match effect {
            Consumption::VerifyEmail => {
                user.email_verified = user.email_verified.or(Some(now));
            }
            Consumption::ResetPassword { password_hash } => {
                user.password_hash = Some(password_hash);
            }
        }
        user.updated_at = now;

        if let Some(t) = inner.tokens.get_mut(&key) {
            t.used_at = Some(now);
        }
        Ok(Some(user_id))
    }
}
