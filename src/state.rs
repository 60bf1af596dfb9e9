use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::ledger::{SqlTokenLedger, TokenLedger};
use crate::config::{AppConfig, JwtConfig};
use crate::db;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub ledger: Arc<dyn TokenLedger>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = db::connect(&config).await?;
        db::migrate(&db).await?;

        let ledger = Arc::new(SqlTokenLedger::new(db.clone())) as Arc<dyn TokenLedger>;

        Ok(Self { db, config, ledger })
    }

    pub fn from_parts(db: SqlitePool, config: Arc<AppConfig>, ledger: Arc<dyn TokenLedger>) -> Self {
        Self { db, config, ledger }
    }

    /// Fully migrated in-memory state with a fixed test JWT configuration.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let db = db::connect_in_memory().await?;
        db::migrate(&db).await?;

        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            max_connections: 1,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
        });

        let ledger = Arc::new(SqlTokenLedger::new(db.clone())) as Arc<dyn TokenLedger>;
        Ok(Self::from_parts(db, config, ledger))
    }
}
