use serde::Serialize;

use crate::config::AppConfig;
use crate::store::AuthProvider;

/// Sign-in methods available to the UI. OAuth entries exist only when both
/// halves of their client configuration are present.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ProviderSet {
    pub credentials: bool,
    pub github: bool,
    pub google: bool,
}

impl ProviderSet {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            credentials: true,
            github: cfg.github.is_configured(),
            google: cfg.google.is_configured(),
        }
    }

    pub fn is_enabled(&self, provider: AuthProvider) -> bool {
        match provider {
            AuthProvider::Credentials => self.credentials,
            AuthProvider::Github => self.github,
            AuthProvider::Google => self.google,
        }
    }
}
