use std::sync::Arc;

use crate::auth::{providers::ProviderSet, tokens::TokenIssuer};
use crate::config::{AppConfig, StoreBackend};
use crate::mail::{LinkBuilder, Mailer, ResendMailer};
use crate::store::{AuthStore, MemoryAuthStore, PgAuthStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AuthStore>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn AuthStore> = match (config.store, config.database_url.as_deref()) {
            (StoreBackend::Postgres, Some(url)) => {
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await?;

                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    tracing::warn!(error = %e, "migration failed; continuing");
                }
                Arc::new(PgAuthStore::new(db))
            }
            (StoreBackend::Postgres, None) => anyhow::bail!("DATABASE_URL is not set"),
            (StoreBackend::Memory, _) => {
                tracing::warn!("using in-memory auth store; data is lost on restart");
                Arc::new(MemoryAuthStore::new())
            }
        };

        if !config.resend.is_configured() {
            tracing::warn!("RESEND_API_KEY or AUTH_EMAIL_FROM missing; emails will not be sent");
        }
        let mailer = Arc::new(ResendMailer::new(config.resend.clone())?) as Arc<dyn Mailer>;

        Ok(Self {
            store,
            mailer,
            config,
        })
    }

    pub fn from_parts(
        store: Arc<dyn AuthStore>,
        mailer: Arc<dyn Mailer>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }

    pub fn tokens(&self) -> TokenIssuer {
        TokenIssuer::new(self.store.clone(), self.config.tokens.clone())
    }

    pub fn links(&self) -> LinkBuilder {
        LinkBuilder::new(self.config.app_base_url.as_str())
    }

    pub fn providers(&self) -> ProviderSet {
        ProviderSet::from_config(&self.config)
    }
}

#[cfg(test)]
pub(crate) struct Fake {
    pub state: AppState,
    pub store: Arc<MemoryAuthStore>,
    pub mailer: Arc<crate::mail::testing::RecordingMailer>,
}

#[cfg(test)]
impl AppState {
    /// Memory store and recording mailer over [`AppConfig::for_tests`].
    pub(crate) fn fake() -> Fake {
        Self::fake_with(AppConfig::for_tests())
    }

    pub(crate) fn fake_with(config: AppConfig) -> Fake {
        let store = Arc::new(MemoryAuthStore::new());
        let mailer = Arc::new(crate::mail::testing::RecordingMailer::new());
        let state = Self::from_parts(store.clone(), mailer.clone(), Arc::new(config));
        Fake {
            state,
            store,
            mailer,
        }
    }
}
