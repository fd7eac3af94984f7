use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::store::{StoreError, TokenKind};

pub const GENERIC_FAILURE: &str = "Something went wrong.";
pub const INVALID_CREDENTIALS: &str = "Invalid credentials.";
pub const VERIFY_EMAIL_FIRST: &str = "Please verify your email before signing in.";
pub const EMAIL_TAKEN: &str = "This email is already registered.";
pub const INVALID_VERIFICATION_LINK: &str = "Verification link is invalid or expired.";
pub const INVALID_RESET_LINK: &str = "This reset link is invalid or expired.";
pub const ACCESS_DENIED: &str = "Access denied.";
pub const REGISTRATION_FAILED: &str = "Failed to register user.";

/// Field-level validation messages, in the order they were found.
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), AuthError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AuthError::Validation(self))
        }
    }

    fn first_message(&self) -> &str {
        self.0
            .values()
            .flat_map(|msgs| msgs.first())
            .next()
            .map(String::as_str)
            .unwrap_or("Invalid input.")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("email already registered")]
    Conflict,
    /// Deliberately covers unknown, expired and already-used tokens alike.
    #[error("{0} token not found, expired or already used")]
    NotFoundOrExpired(TokenKind),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("email not verified")]
    EmailNotVerified,
    #[error("sign-in rejected: {0}")]
    AccessDenied(&'static str),
    #[error("registration failed: {0}")]
    RegistrationFailed(#[source] anyhow::Error),
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => AuthError::Conflict,
            other => AuthError::Store(other),
        }
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) | AuthError::NotFoundOrExpired(_) => StatusCode::BAD_REQUEST,
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::EmailNotVerified => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::AccessDenied(_) => StatusCode::FORBIDDEN,
            AuthError::RegistrationFailed(_) | AuthError::Store(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text safe to show the end user. Never includes store or provider detail.
    pub fn user_message(&self) -> &str {
        match self {
            AuthError::Validation(fields) => fields.first_message(),
            AuthError::Conflict => EMAIL_TAKEN,
            AuthError::NotFoundOrExpired(TokenKind::EmailVerification) => {
                INVALID_VERIFICATION_LINK
            }
            AuthError::NotFoundOrExpired(TokenKind::PasswordReset) => INVALID_RESET_LINK,
            AuthError::InvalidCredentials => INVALID_CREDENTIALS,
            AuthError::EmailNotVerified => VERIFY_EMAIL_FIRST,
            AuthError::AccessDenied(_) => ACCESS_DENIED,
            AuthError::RegistrationFailed(_) => REGISTRATION_FAILED,
            AuthError::Store(_) | AuthError::Internal(_) => GENERIC_FAILURE,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "auth request failed");
        }
        let body = match &self {
            AuthError::Validation(fields) => json!({
                "error": self.user_message(),
                "fields": fields,
            }),
            _ => json!({ "error": self.user_message() }),
        };
        (status, Json(body)).into_response()
    }
}
