use std::sync::Arc;

use axum::extract::FromRef;
use tracing::warn;

use crate::auth::{
    jwt::JwtKeys,
    repo::{MemoryUserStore, PgUserStore, UserStore},
    services::AuthService,
};
use crate::config::AppConfig;
use crate::db;
use crate::leads::{
    repo::{LeadStore, MemoryLeadStore, PgLeadStore},
    services::LeadService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: Arc<JwtKeys>,
    pub auth: AuthService,
    pub leads: LeadService,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let (users, leads): (Arc<dyn UserStore>, Arc<dyn LeadStore>) =
            match config.database_url.as_deref() {
                Some(url) => {
                    let pool = db::connect(url, config.max_connections).await?;
                    (
                        Arc::new(PgUserStore::new(pool.clone())),
                        Arc::new(PgLeadStore::new(pool)),
                    )
                }
                None => {
                    warn!("DATABASE_URL not set; using in-memory stores, data is lost on exit");
                    (
                        Arc::new(MemoryUserStore::new()),
                        Arc::new(MemoryLeadStore::new()),
                    )
                }
            };

        Ok(Self::from_parts(config, users, leads))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        leads: Arc<dyn LeadStore>,
    ) -> Self {
        let keys = Arc::new(JwtKeys::new(&config.jwt));
        Self {
            auth: AuthService::new(users, keys.clone()),
            leads: LeadService::new(leads),
            keys,
            config,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
                ttl_minutes: 5,
            },
        });

        Self::from_parts(
            config,
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryLeadStore::new()),
        )
    }
}

impl FromRef<AppState> for Arc<JwtKeys> {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}
