//! Auth flows composed from the store, token issuer, gate and mailer.
//!
//! Handlers stay thin; everything that decides an outcome lives here so it
//! can be exercised against the memory store.

use axum::extract::FromRef;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    LoginResponse, OAuthCallbackResponse, ProviderIdentity, PublicUser, RegisterRequest,
    ResetPasswordRequest,
};
use super::gate;
use super::jwt::SessionKeys;
use super::password::hash_password;
use super::reconciler::{self, Reconciled};
use super::validation::{validate_email_field, validate_password_reset, validate_registration};
use crate::error::AuthError;
use crate::mail::templates;
use crate::state::AppState;
use crate::store::{Consumption, NewCredentialsUser, StoreError, TokenKind, User};

pub const REGISTERED: &str = "Account created. Please check your email to activate your account.";
pub const REGISTERED_EMAIL_FAILED: &str =
    "Account created, but the verification email could not be sent.";
pub const EMAIL_VERIFIED: &str = "Email verified successfully. You can now log in.";
pub const RESET_LINK_SENT: &str = "If this email exists, a reset link has been sent.";
pub const PASSWORD_UPDATED: &str = "Password updated. You can now sign in.";
pub const VERIFICATION_RESENT: &str =
    "If this email is registered and not yet verified, a new link has been sent.";

#[derive(Debug)]
pub struct Registration {
    pub user: User,
    pub verification_email_sent: bool,
}

impl Registration {
    pub fn message(&self) -> &'static str {
        if self.verification_email_sent {
            REGISTERED
        } else {
            REGISTERED_EMAIL_FAILED
        }
    }
}

fn registration_failed(e: StoreError) -> AuthError {
    match e {
        StoreError::Conflict => AuthError::Conflict,
        other => AuthError::RegistrationFailed(other.into()),
    }
}

async fn send_verification_link(state: &AppState, user: &User, name: &str) -> bool {
    let raw = match state
        .tokens()
        .issue(TokenKind::EmailVerification, user.id, &user.email)
        .await
    {
        Ok(raw) => raw,
        Err(e) => {
            error!(error = %e, user_id = %user.id, "failed to issue verification token");
            return false;
        }
    };
    let link = state.links().absolute(&format!("/verify-email?token={raw}"));
    state
        .mailer
        .send(&templates::verification_email(&user.email, name, &link))
        .await
}

#[instrument(skip_all)]
pub async fn register(state: &AppState, req: RegisterRequest) -> Result<Registration, AuthError> {
    let input = validate_registration(req)?;

    // The unique index still decides races; this only avoids a wasted hash.
    if state
        .store
        .find_by_email(&input.email)
        .await
        .map_err(registration_failed)?
        .is_some()
    {
        warn!("registration for existing email");
        return Err(AuthError::Conflict);
    }

    let password_hash = hash_password(&input.password).map_err(AuthError::RegistrationFailed)?;
    let user = state
        .store
        .create_credentials_user(NewCredentialsUser {
            name: input.name.clone(),
            email: input.email,
            password_hash,
        })
        .await
        .map_err(registration_failed)?;

    let verification_email_sent = send_verification_link(state, &user, &input.name).await;
    if !verification_email_sent {
        warn!(user_id = %user.id, "verification email not delivered");
    }
    info!(user_id = %user.id, "user registered");
    Ok(Registration {
        user,
        verification_email_sent,
    })
}

#[instrument(skip_all)]
pub async fn verify_email(state: &AppState, token: Option<&str>) -> Result<Uuid, AuthError> {
    let invalid = AuthError::NotFoundOrExpired(TokenKind::EmailVerification);
    let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
        return Err(invalid);
    };
    match state
        .tokens()
        .verify_and_consume(token, Consumption::VerifyEmail)
        .await?
    {
        Some(user_id) => {
            info!(%user_id, "email verified");
            Ok(user_id)
        }
        None => Err(invalid),
    }
}

/// Only validation errors are reported; every later outcome looks the same.
#[instrument(skip_all)]
pub async fn resend_verification(state: &AppState, email: &str) -> Result<(), AuthError> {
    let email = validate_email_field(email)?;
    if let Err(e) = resend_verification_link(state, &email).await {
        error!(error = %e, "resend verification failed");
    }
    Ok(())
}

async fn resend_verification_link(state: &AppState, email: &str) -> Result<(), AuthError> {
    let Some(user) = state.store.find_by_email(email).await? else {
        return Ok(());
    };
    if user.password_hash.is_none() || user.email_verified.is_some() {
        return Ok(());
    }
    let name = user.name.clone().unwrap_or_else(|| user.email.clone());
    if !send_verification_link(state, &user, &name).await {
        warn!(user_id = %user.id, "verification email not delivered");
    }
    Ok(())
}

/// Issues a reset token only for password accounts; the caller always gets
/// the same answer once the email is well formed.
#[instrument(skip_all)]
pub async fn request_password_reset(state: &AppState, email: &str) -> Result<(), AuthError> {
    let email = validate_email_field(email)?;
    if let Err(e) = send_reset_link(state, &email).await {
        error!(error = %e, "password reset request failed");
    }
    Ok(())
}

async fn send_reset_link(state: &AppState, email: &str) -> Result<(), AuthError> {
    let Some(user) = state.store.find_by_email(email).await? else {
        info!("password reset requested for unknown email");
        return Ok(());
    };
    if user.password_hash.is_none() {
        info!(user_id = %user.id, "password reset requested for account without password");
        return Ok(());
    }
    let raw = state
        .tokens()
        .issue(TokenKind::PasswordReset, user.id, &user.email)
        .await?;
    let link = state
        .links()
        .absolute(&format!("/reset-password?token={raw}"));
    if !state
        .mailer
        .send(&templates::password_reset_email(&user.email, &link))
        .await
    {
        warn!(user_id = %user.id, "password reset email not delivered");
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn reset_password(state: &AppState, req: ResetPasswordRequest) -> Result<Uuid, AuthError> {
    validate_password_reset(&req)?;
    let password_hash = hash_password(&req.password)?;
    match state
        .tokens()
        .verify_and_consume(
            req.token.trim(),
            Consumption::ResetPassword { password_hash },
        )
        .await?
    {
        Some(user_id) => {
            info!(%user_id, "password reset");
            Ok(user_id)
        }
        None => Err(AuthError::NotFoundOrExpired(TokenKind::PasswordReset)),
    }
}

#[instrument(skip_all)]
pub async fn login(state: &AppState, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
    let user = gate::authenticate(state.store.as_ref(), email, password).await?;
    let keys = SessionKeys::from_ref(state);
    let session_grant = keys.sign_session(&user)?;
    Ok(LoginResponse {
        user,
        session_grant,
        expires_in: keys.ttl.as_secs() as i64,
    })
}

#[instrument(skip_all)]
pub async fn oauth_sign_in(
    state: &AppState,
    identity: ProviderIdentity,
) -> Result<OAuthCallbackResponse, AuthError> {
    let user = match reconciler::reconcile(state.store.as_ref(), &state.providers(), identity).await? {
        Reconciled::PassThrough => None,
        Reconciled::Linked(user) => Some(PublicUser::from(&user)),
    };
    Ok(OAuthCallbackResponse {
        accepted: true,
        user,
    })
}
