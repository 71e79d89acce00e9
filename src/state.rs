use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clients::{LogMailer, Mailer, SmtpMailer};
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, ProvisionService, SeaOrmAuthService, SeaOrmProvisionService,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub mailer: Arc<dyn Mailer>,

    pub provision: Arc<dyn ProvisionService>,

    pub auth: Arc<dyn AuthService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let mailer: Arc<dyn Mailer> = if config.email.enabled {
            Arc::new(SmtpMailer::from_config(&config.email)?)
        } else {
            Arc::new(LogMailer)
        };

        Self::with_mailer(config, mailer).await
    }

    /// Used by tests to substitute a recording mailer.
    pub async fn with_mailer(config: Config, mailer: Arc<dyn Mailer>) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let config_arc = Arc::new(RwLock::new(config));

        let provision = Arc::new(SeaOrmProvisionService::new(
            store.clone(),
            mailer.clone(),
            config_arc.clone(),
        )) as Arc<dyn ProvisionService>;

        let auth = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            mailer.clone(),
            config_arc.clone(),
        )) as Arc<dyn AuthService>;

        Ok(Self {
            config: config_arc,
            store,
            mailer,
            provision,
            auth,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
