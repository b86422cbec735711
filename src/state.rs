use crate::config::AppConfig;
use crate::storage::{MemoryStorage, Storage, StorageClient};
use crate::users::{
    memory::MemoryUserStore,
    repo::{PgUserStore, UserStore},
};
use anyhow::Context;
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    /// Wires the collaborators named by the environment. The Postgres pool, when
    /// one is configured, is returned as well so the caller can run migrations.
    pub async fn init() -> anyhow::Result<(Self, Option<PgPool>)> {
        let config = Arc::new(AppConfig::from_env()?);

        let (users, db) = match &config.database_url {
            Some(url) => {
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(config.database_max_connections)
                    .acquire_timeout(Duration::from_secs(config.database_acquire_timeout_secs))
                    .connect(url)
                    .await
                    .context("connect to database")?;
                let users = Arc::new(PgUserStore::new(db.clone())) as Arc<dyn UserStore>;
                (users, Some(db))
            }
            None => {
                warn!("DATABASE_URL not set; users are kept in memory");
                (Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>, None)
            }
        };

        let storage = match &config.storage {
            Some(cfg) => Arc::new(Storage::new(cfg).await?) as Arc<dyn StorageClient>,
            None => {
                warn!("S3_ENDPOINT not set; profile images are kept in memory");
                Arc::new(MemoryStorage::new()) as Arc<dyn StorageClient>
            }
        };

        Ok((Self::from_parts(users, config, storage), db))
    }

    pub fn from_parts(
        users: Arc<dyn UserStore>,
        config: Arc<AppConfig>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self {
            users,
            config,
            storage,
        }
    }

    /// Releases the store connection. Faults are logged, never propagated.
    pub async fn shutdown(&self) {
        info!("closing user store");
        match self.users.close().await {
            Ok(()) => info!("user store closed"),
            Err(e) => error!(error = ?e, "failed to close user store"),
        }
    }

    /// In-memory wiring for tests.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::JwtConfig;

        let config = Arc::new(AppConfig {
            database_url: None,
            database_max_connections: 1,
            database_acquire_timeout_secs: 1,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
                ttl_minutes: 5,
            },
            storage: None,
            cors_origins: crate::config::merge_origins(None),
            max_image_bytes: 1024 * 1024,
        });

        Self::from_parts(
            Arc::new(MemoryUserStore::new()),
            config,
            Arc::new(MemoryStorage::new()),
        )
    }
}
