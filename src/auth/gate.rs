//! Credential login decision.

use tracing::{info, warn};

use super::dto::PublicUser;
use super::password::verify_password;
use super::validation::{login_input_plausible, normalize_email};
use crate::error::AuthError;
use crate::store::AuthStore;

/// Accept or reject an email/password pair.
///
/// Unknown email, password-less account and wrong password all yield
/// [`AuthError::InvalidCredentials`]. An unverified email is reported as
/// [`AuthError::EmailNotVerified`] before the password is compared.
pub async fn authenticate(
    store: &dyn AuthStore,
    email: &str,
    password: &str,
) -> Result<PublicUser, AuthError> {
    let email = normalize_email(email);
    if !login_input_plausible(&email, password) {
        return Err(AuthError::InvalidCredentials);
    }

    let Some(user) = store.find_by_email(&email).await? else {
        warn!("login unknown email");
        return Err(AuthError::InvalidCredentials);
    };

    let Some(hash) = user.password_hash.as_deref() else {
        warn!(user_id = %user.id, "login on account without password");
        return Err(AuthError::InvalidCredentials);
    };

    if user.email_verified.is_none() {
        warn!(user_id = %user.id, "login before email verification");
        return Err(AuthError::EmailNotVerified);
    }

    if !verify_password(password, hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    info!(user_id = %user.id, "credentials accepted");
    Ok(PublicUser::from(&user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::error::{INVALID_CREDENTIALS, VERIFY_EMAIL_FIRST};
    use crate::store::{AuthProvider, MemoryAuthStore, NewCredentialsUser, OAuthProfile};

    async fn store_with(verified: bool) -> MemoryAuthStore {
        let store = MemoryAuthStore::new();
        let user = store
            .create_credentials_user(NewCredentialsUser {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                password_hash: hash_password("secret1").unwrap(),
            })
            .await
            .unwrap();
        if verified {
            store.mark_email_verified(user.id).await.unwrap();
        }
        store
    }

    fn message(res: Result<PublicUser, AuthError>) -> String {
        res.unwrap_err().user_message().to_string()
    }

    #[tokio::test]
    async fn verified_user_with_right_password_is_accepted() {
        let store = store_with(true).await;
        let identity = authenticate(&store, "ada@example.com", "secret1").await.unwrap();
        assert_eq!(identity.name, "Ada");
        assert_eq!(identity.email, "ada@example.com");
        assert_eq!(identity.image, None);
    }

    #[tokio::test]
    async fn unverified_user_gets_specific_message() {
        let store = store_with(false).await;
        let res = authenticate(&store, "ada@example.com", "secret1").await;
        assert_eq!(message(res), VERIFY_EMAIL_FIRST);
    }

    #[tokio::test]
    async fn unverified_check_precedes_password() {
        let store = store_with(false).await;
        let res = authenticate(&store, "ada@example.com", "wrong-password").await;
        assert!(matches!(res, Err(AuthError::EmailNotVerified)));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_identical() {
        let store = store_with(true).await;
        let unknown = authenticate(&store, "ghost@example.com", "secret1").await;
        let wrong = authenticate(&store, "ada@example.com", "secret2").await;
        let (unknown, wrong) = (unknown.unwrap_err(), wrong.unwrap_err());
        assert_eq!(unknown.user_message(), INVALID_CREDENTIALS);
        assert_eq!(unknown.user_message(), wrong.user_message());
        assert_eq!(unknown.status(), wrong.status());
    }

    #[tokio::test]
    async fn oauth_only_account_cannot_use_password() {
        let store = MemoryAuthStore::new();
        store
            .upsert_oauth_user(OAuthProfile {
                name: Some("Grace".into()),
                email: "grace@example.com".into(),
                image_url: None,
                provider: AuthProvider::Github,
                provider_account_id: Some("7".into()),
                email_verified: Some(time::OffsetDateTime::now_utc()),
            })
            .await
            .unwrap();
        let res = authenticate(&store, "grace@example.com", "anything").await;
        assert_eq!(message(res), INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn malformed_input_is_generic() {
        let store = store_with(true).await;
        assert_eq!(
            message(authenticate(&store, "not-an-email", "secret1").await),
            INVALID_CREDENTIALS
        );
        assert_eq!(
            message(authenticate(&store, "ada@example.com", "123").await),
            INVALID_CREDENTIALS
        );
    }
}
