use std::sync::Arc;

use anyhow::Context;

use crate::{
    accounts::AccountRepo,
    auth::{cookie::SessionCookie, jwt::JwtKeys},
    categories::CategoryRepo,
    config::AppConfig,
    store::{memory::MemoryStore, mongo::MongoStore, DocumentStore},
    transactions::TransactionRepo,
    users::UserRepo,
};

/// `MONGO_URL` value that selects the in-process store.
pub const MEMORY_URL: &str = "memory://";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub cookie: SessionCookie,
    pub users: UserRepo,
    pub accounts: AccountRepo,
    pub categories: CategoryRepo,
    pub transactions: TransactionRepo,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn DocumentStore> = if config.mongo_url == MEMORY_URL {
            tracing::warn!("using the in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        } else {
            let mongo =
                MongoStore::connect(&config.mongo_url, &config.database, config.request_timeout())
                    .await
                    .context("connecting to MongoDB")?;
            Arc::new(mongo)
        };

        Self::from_parts(config, store).await
    }

    /// Wires repositories onto `store` and makes sure the user indexes exist.
    pub async fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn DocumentStore>,
    ) -> anyhow::Result<Self> {
        UserRepo::ensure_indexes(store.as_ref())
            .await
            .context("creating user indexes")?;

        let keys = JwtKeys::new(&config.jwt);
        let cookie = SessionCookie::new(&config.cookie, keys.ttl());
        Ok(Self {
            users: UserRepo::new(store.as_ref()),
            accounts: AccountRepo::new(store.as_ref()),
            categories: CategoryRepo::new(store.as_ref()),
            transactions: TransactionRepo::new(store.as_ref()),
            keys,
            cookie,
            config,
        })
    }

    /// Configuration used by tests: in-memory store and fixed JWT settings.
    #[cfg(test)]
    pub fn test_config() -> AppConfig {
        use crate::config::{CookieConfig, JwtConfig};

        AppConfig {
            mongo_url: MEMORY_URL.into(),
            database: "budget_test".into(),
            host: "127.0.0.1".into(),
            port: 0,
            request_timeout_secs: 5,
            jwt: JwtConfig {
                secret: "test-secret-that-is-long-enough-for-hs256".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_days: 7,
            },
            cookie: CookieConfig {
                name: "token".into(),
                secure: false,
            },
        }
    }

    /// State over an empty in-memory store, for tests.
    #[cfg(test)]
    pub async fn fake() -> Self {
        Self::from_parts(Arc::new(Self::test_config()), Arc::new(MemoryStore::new()))
            .await
            .expect("in-memory state")
    }
}
