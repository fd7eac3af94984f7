//! HS256 grants exchanged with the external session manager.
//!
//! A *session grant* is handed out after a successful credential login and
//! is accepted as a bearer token by `/me`. A *provider assertion* carries an
//! OAuth identity from the session manager into the reconciler. Both are
//! signed with `auth_secret` and tagged with their kind so one cannot stand
//! in for the other.

use std::time::Duration;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use super::dto::{ProviderIdentity, PublicUser};
use crate::{config::SessionConfig, state::AppState, store::AuthProvider};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GrantKind {
    Session,
    Provider,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
    pub kind: GrantKind,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderClaims {
    pub provider: AuthProvider,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
    pub kind: GrantKind,
}

impl From<ProviderClaims> for ProviderIdentity {
    fn from(c: ProviderClaims) -> Self {
        Self {
            provider: c.provider,
            provider_account_id: c.sub,
            email: c.email,
            name: c.name,
            image_url: c.picture,
        }
    }
}

#[derive(Clone)]
pub struct SessionKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.auth_secret, &state.config.session)
    }
}

impl SessionKeys {
    pub fn new(secret: &str, session: &SessionConfig) -> Self {
        let SessionConfig {
            issuer,
            audience,
            ttl_minutes,
        } = session.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            ttl: Duration::from_secs((ttl_minutes.max(1) as u64) * 60),
        }
    }

    fn window(&self) -> (usize, usize) {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        (now.unix_timestamp() as usize, exp.unix_timestamp() as usize)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }

    pub fn sign_session(&self, user: &PublicUser) -> anyhow::Result<String> {
        let (iat, exp) = self.window();
        let claims = SessionClaims {
            sub: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            picture: user.image.clone(),
            iat,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: GrantKind::Session,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user.id, "session grant signed");
        Ok(token)
    }

    pub fn verify_session(&self, token: &str) -> anyhow::Result<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation())?;
        if data.claims.kind != GrantKind::Session {
            anyhow::bail!("not a session grant");
        }
        debug!(user_id = %data.claims.sub, "session grant verified");
        Ok(data.claims)
    }

    pub fn sign_provider_assertion(&self, identity: &ProviderIdentity) -> anyhow::Result<String> {
        let (iat, exp) = self.window();
        let claims = ProviderClaims {
            provider: identity.provider,
            sub: identity.provider_account_id.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            picture: identity.image_url.clone(),
            iat,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: GrantKind::Provider,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_provider_assertion(&self, token: &str) -> anyhow::Result<ProviderIdentity> {
        let data = decode::<ProviderClaims>(token, &self.decoding, &self.validation())?;
        if data.claims.kind != GrantKind::Provider {
            anyhow::bail!("not a provider assertion");
        }
        debug!(provider = %data.claims.provider, "provider assertion verified");
        Ok(data.claims.into())
    }
}

/// Bearer session grant, verified.
pub struct AuthUser(pub SessionClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Missing Authorization header".to_string(),
            ))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Invalid Authorization header".to_string(),
            ))?;

        match keys.verify_session(token) {
            Ok(claims) => Ok(AuthUser(claims)),
            Err(e) => {
                warn!(error = %e, "invalid or expired session grant");
                Err((
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired session grant".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> SessionKeys {
        SessionKeys::new(
            secret,
            &SessionConfig {
                issuer: issuer.into(),
                audience: audience.into(),
                ttl_minutes: 5,
            },
        )
    }

    fn user() -> PublicUser {
        PublicUser {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            image: None,
        }
    }

    fn identity() -> ProviderIdentity {
        ProviderIdentity {
            provider: AuthProvider::Github,
            provider_account_id: Some("gh-1".into()),
            email: Some("ada@example.com".into()),
            name: Some("Ada".into()),
            image_url: None,
        }
    }

    #[test]
    fn keys_follow_app_config() {
        let fake = AppState::fake();
        let keys = SessionKeys::from_ref(&fake.state);
        assert_eq!(keys.issuer, AppConfig::for_tests().session.issuer);
        assert_eq!(keys.ttl, Duration::from_secs(300));
    }

    #[test]
    fn sign_and_verify_session_grant() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let user = user();
        let token = keys.sign_session(&user).expect("sign session");
        let claims = keys.verify_session(&token).expect("verify session");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, GrantKind::Session);
    }

    #[test]
    fn provider_assertion_round_trips_identity() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys.sign_provider_assertion(&identity()).expect("sign");
        let back = keys.verify_provider_assertion(&token).expect("verify");
        assert_eq!(back.provider, AuthProvider::Github);
        assert_eq!(back.provider_account_id.as_deref(), Some("gh-1"));
        assert_eq!(back.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn grant_kinds_are_not_interchangeable() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let assertion = keys.sign_provider_assertion(&identity()).unwrap();
        assert!(keys.verify_session(&assertion).is_err());

        let grant = keys.sign_session(&user()).unwrap();
        assert!(keys.verify_provider_assertion(&grant).is_err());
    }

    #[test]
    fn verify_rejects_wrong_issuer_audience_or_secret() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let bad = make_keys("same-secret", "bad-iss", "bad-aud");
        let forged = make_keys("other-secret", "good-iss", "good-aud");
        let token = good.sign_session(&user()).unwrap();
        assert!(bad.verify_session(&token).is_err());
        assert!(forged.verify_session(&token).is_err());
    }
}
