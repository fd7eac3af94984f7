use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::StoreError;

/// How a user last authenticated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Credentials,
    Github,
    Google,
}

impl AuthProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthProvider::Credentials => "credentials",
            AuthProvider::Github => "github",
            AuthProvider::Google => "google",
        }
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthProvider {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credentials" => Ok(AuthProvider::Credentials),
            "github" => Ok(AuthProvider::Github),
            "google" => Ok(AuthProvider::Google),
            other => Err(StoreError::InvalidRow(format!("unknown auth_provider {other:?}"))),
        }
    }
}

/// User record.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // never exposed in JSON
    pub image_url: Option<String>,
    pub auth_provider: AuthProvider,
    pub provider_account_id: Option<String>,
    pub email_verified: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub last_login_at: OffsetDateTime,
}

/// Raw `auth_users` row; `auth_provider` is stored as text.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub password_hash: Option<String>,
    pub image_url: Option<String>,
    pub auth_provider: String,
    pub provider_account_id: Option<String>,
    pub email_verified: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub last_login_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            image_url: r.image_url,
            auth_provider: r.auth_provider.parse()?,
            provider_account_id: r.provider_account_id,
            email_verified: r.email_verified,
            created_at: r.created_at,
            updated_at: r.updated_at,
            last_login_at: r.last_login_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewCredentialsUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Provider-attested identity to merge into `auth_users`.
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub name: Option<String>,
    pub email: String,
    pub image_url: Option<String>,
    pub provider: AuthProvider,
    pub provider_account_id: Option<String>,
    pub email_verified: Option<OffsetDateTime>,
}

/// The two single-use token families. Each lives in its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    EmailVerification,
    PasswordReset,
}

impl TokenKind {
    pub fn table(self) -> &'static str {
        match self {
            TokenKind::EmailVerification => "email_verification_tokens",
            TokenKind::PasswordReset => "password_reset_tokens",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::EmailVerification => f.write_str("email_verification"),
            TokenKind::PasswordReset => f.write_str("password_reset"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewToken {
    pub user_id: Uuid,
    pub email: String,
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
}

/// Side effect applied in the same transaction that marks a token used.
#[derive(Debug, Clone)]
pub enum Consumption {
    VerifyEmail,
    ResetPassword { password_hash: String },
}

impl Consumption {
    pub fn kind(&self) -> TokenKind {
        match self {
            Consumption::VerifyEmail => TokenKind::EmailVerification,
            Consumption::ResetPassword { .. } => TokenKind::PasswordReset,
        }
    }
}
