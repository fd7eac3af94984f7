use serde::Deserialize;

const DEFAULT_APP_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Which backend holds users and tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    /// Single-process only; state is lost on restart.
    Memory,
}

#[derive(Clone, Deserialize)]
pub struct ResendConfig {
    pub api_key: Option<String>,
    pub email_from: Option<String>,
    pub api_url: String,
}

impl ResendConfig {
    /// Both the key and the sender must be present for real delivery.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.email_from.is_some()
    }
}

#[derive(Clone, Deserialize)]
pub struct OAuthClientConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl OAuthClientConfig {
    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub verification_ttl_hours: i64,
    pub reset_ttl_minutes: i64,
    pub revoke_prior: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            verification_ttl_hours: 24,
            reset_ttl_minutes: 30,
            revoke_prior: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub app_base_url: String,
    pub resend: ResendConfig,
    pub github: OAuthClientConfig,
    pub google: OAuthClientConfig,
    pub auth_secret: String,
    pub tokens: TokenConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match env_opt(&["AUTH_STORE"]).as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => anyhow::bail!("unknown AUTH_STORE {other:?}"),
        };
        let database_url = env_opt(&["DATABASE_URL"]);
        if store == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when AUTH_STORE=postgres");
        }

        let auth_secret = env_opt(&["AUTH_SECRET", "NEXTAUTH_SECRET"])
            .ok_or_else(|| anyhow::anyhow!("AUTH_SECRET is required"))?;

        let defaults = TokenConfig::default();
        let tokens = TokenConfig {
            verification_ttl_hours: env_parse("AUTH_VERIFICATION_TTL_HOURS")
                .unwrap_or(defaults.verification_ttl_hours),
            reset_ttl_minutes: env_parse("AUTH_RESET_TTL_MINUTES")
                .unwrap_or(defaults.reset_ttl_minutes),
            revoke_prior: env_parse("AUTH_REVOKE_PRIOR_TOKENS").unwrap_or(defaults.revoke_prior),
        };

        Ok(Self {
            store,
            database_url,
            app_base_url: env_opt(&["APP_URL", "AUTH_URL", "NEXTAUTH_URL"])
                .unwrap_or_else(|| DEFAULT_APP_BASE_URL.into()),
            resend: ResendConfig {
                api_key: env_opt(&["RESEND_API_KEY"]),
                email_from: env_opt(&["AUTH_EMAIL_FROM"]),
                api_url: env_opt(&["RESEND_API_URL"])
                    .unwrap_or_else(|| DEFAULT_RESEND_API_URL.into()),
            },
            github: OAuthClientConfig {
                client_id: env_opt(&["AUTH_GITHUB_ID", "GITHUB_ID"]),
                client_secret: env_opt(&["AUTH_GITHUB_SECRET", "GITHUB_SECRET"]),
            },
            google: OAuthClientConfig {
                client_id: env_opt(&["AUTH_GOOGLE_ID", "GOOGLE_CLIENT_ID"]),
                client_secret: env_opt(&["AUTH_GOOGLE_SECRET", "GOOGLE_CLIENT_SECRET"]),
            },
            auth_secret,
            tokens,
            session: SessionConfig {
                issuer: env_opt(&["SESSION_ISSUER"]).unwrap_or_else(|| "invoice-auth".into()),
                audience: env_opt(&["SESSION_AUDIENCE"])
                    .unwrap_or_else(|| "invoice-dashboard".into()),
                ttl_minutes: env_parse("SESSION_TTL_MINUTES").unwrap_or(5),
            },
        })
    }

    /// Configuration used by unit tests and `AppState::fake`.
    pub fn for_tests() -> Self {
        Self {
            store: StoreBackend::Memory,
            database_url: None,
            app_base_url: "https://invoices.test".into(),
            resend: ResendConfig {
                api_key: None,
                email_from: None,
                api_url: DEFAULT_RESEND_API_URL.into(),
            },
            github: OAuthClientConfig {
                client_id: Some("gh-id".into()),
                client_secret: Some("gh-secret".into()),
            },
            google: OAuthClientConfig {
                client_id: None,
                client_secret: None,
            },
            auth_secret: "test-secret".into(),
            tokens: TokenConfig::default(),
            session: SessionConfig {
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
        }
    }
}

/// First non-empty value among `keys`.
fn env_opt(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| std::env::var(k).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_opt(&[key]).and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resend_requires_key_and_sender() {
        let mut cfg = AppConfig::for_tests().resend;
        assert!(!cfg.is_configured());
        cfg.api_key = Some("re_123".into());
        assert!(!cfg.is_configured());
        cfg.email_from = Some("Invoices <auth@invoices.test>".into());
        assert!(cfg.is_configured());
    }

    #[test]
    fn oauth_client_needs_both_halves() {
        let cfg = AppConfig::for_tests();
        assert!(cfg.github.is_configured());
        assert!(!cfg.google.is_configured());
    }

    #[test]
    fn token_defaults_match_lifetimes() {
        let t = TokenConfig::default();
        assert_eq!(t.verification_ttl_hours, 24);
        assert_eq!(t.reset_ttl_minutes, 30);
        assert!(!t.revoke_prior);
    }
}
