//! Credential store: users, password hashes, provider linkage and the
//! single-use token tables.

use async_trait::async_trait;
use uuid::Uuid;

mod memory;
mod pg;
mod types;

pub use memory::MemoryAuthStore;
pub use pg::PgAuthStore;
pub use types::{
    AuthProvider, Consumption, NewCredentialsUser, NewToken, OAuthProfile, TokenKind, User,
    UserRow,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    Conflict,
    #[error("invalid row: {0}")]
    InvalidRow(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence operations used by the auth flows.
///
/// Implementations must make `upsert_oauth_user` and `consume_token` atomic:
/// the first keyed on the unique email, the second covering both the
/// `used_at` transition and its side effect.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the email already exists.
    async fn create_credentials_user(&self, new: NewCredentialsUser) -> Result<User, StoreError>;

    async fn upsert_oauth_user(&self, profile: OAuthProfile) -> Result<User, StoreError>;

    async fn set_password_hash(&self, user_id: Uuid, hash: &str) -> Result<(), StoreError>;

    /// Keeps the first verification timestamp if one is already set.
    async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), StoreError>;

    async fn insert_token(&self, kind: TokenKind, token: NewToken) -> Result<(), StoreError>;

    /// Marks every outstanding token of `kind` for the user as used.
    async fn revoke_outstanding_tokens(
        &self,
        kind: TokenKind,
        user_id: Uuid,
    ) -> Result<u64, StoreError>;

    /// Returns the owning user id when the token was valid and is now used.
    async fn consume_token(
        &self,
        token_hash: &str,
        effect: Consumption,
    ) -> Result<Option<Uuid>, StoreError>;
}
