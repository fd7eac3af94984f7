//! Merges provider-attested identities into the single per-email user row.

use time::OffsetDateTime;
use tracing::{error, info, warn};

use super::dto::ProviderIdentity;
use super::providers::ProviderSet;
use super::validation::normalize_email;
use crate::error::AuthError;
use crate::store::{AuthProvider, AuthStore, OAuthProfile, User};

#[derive(Debug)]
pub enum Reconciled {
    /// Credentials sign-ins are decided by the gate; the row is left alone.
    PassThrough,
    Linked(User),
}

/// Runs on every provider callback before the session manager establishes a
/// session. Any error means the sign-in must not proceed.
pub async fn reconcile(
    store: &dyn AuthStore,
    providers: &ProviderSet,
    identity: ProviderIdentity,
) -> Result<Reconciled, AuthError> {
    if identity.provider == AuthProvider::Credentials {
        return Ok(Reconciled::PassThrough);
    }

    if !providers.is_enabled(identity.provider) {
        warn!(provider = %identity.provider, "sign-in from provider that is not configured");
        return Err(AuthError::AccessDenied("provider not enabled"));
    }

    let Some(email) = identity
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
    else {
        warn!(provider = %identity.provider, "provider sign-in without email");
        return Err(AuthError::AccessDenied("missing email"));
    };

    let profile = OAuthProfile {
        name: identity.name.filter(|n| !n.trim().is_empty()),
        email,
        image_url: identity.image_url.filter(|u| !u.trim().is_empty()),
        provider: identity.provider,
        provider_account_id: identity.provider_account_id,
        // The provider attests the address; no token round-trip.
        email_verified: Some(OffsetDateTime::now_utc()),
    };

    match store.upsert_oauth_user(profile).await {
        Ok(user) => {
            info!(user_id = %user.id, provider = %user.auth_provider, "provider identity linked");
            Ok(Reconciled::Linked(user))
        }
        Err(e) => {
            error!(error = %e, "failed to sync provider user");
            Err(AuthError::AccessDenied("store failure"))
        }
    }
}
