use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{AuthProvider, User};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for credential login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for forgot-password and resend-verification.
#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, alias = "confirmPassword")]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub token: Option<String>,
}

/// Provider callback relayed by the session manager as a signed assertion.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackRequest {
    #[serde(default)]
    pub assertion: String,
}

/// Identity attested by an OAuth provider, as relayed by the session manager.
#[derive(Debug, Clone)]
pub struct ProviderIdentity {
    pub provider: AuthProvider,
    pub provider_account_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub image_url: Option<String>,
}

/// Minimal identity handed to the session manager.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone().unwrap_or_else(|| u.email.clone()),
            email: u.email.clone(),
            image: u.image_url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub verification_email_sent: bool,
}

/// Response returned after a successful credential login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: PublicUser,
    pub session_grant: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct OAuthCallbackResponse {
    pub accepted: bool,
    pub user: Option<PublicUser>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn public_user_name_falls_back_to_email() {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: None,
            email: "ada@example.com".into(),
            password_hash: Some("secret-hash".into()),
            image_url: Some("https://img.test/ada.png".into()),
            auth_provider: AuthProvider::Github,
            provider_account_id: Some("42".into()),
            email_verified: Some(now),
            created_at: now,
            updated_at: now,
            last_login_at: now,
        };
        let public = PublicUser::from(&user);
        assert_eq!(public.name, "ada@example.com");
        assert_eq!(public.image.as_deref(), Some("https://img.test/ada.png"));

        let json = serde_json::to_string(&public).unwrap();
        assert!(!json.contains("secret-hash"));
    }

    #[test]
    fn reset_request_accepts_camel_case_confirmation() {
        let req: ResetPasswordRequest = serde_json::from_str(
            r#"{"token":"0123456789","password":"secret1","confirmPassword":"secret1"}"#,
        )
        .unwrap();
        assert_eq!(req.confirm_password, "secret1");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let req: RegisterRequest = serde_json::from_str("{}").unwrap();
        assert!(req.name.is_empty() && req.email.is_empty() && req.password.is_empty());
    }
}
