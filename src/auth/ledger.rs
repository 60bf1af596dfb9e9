//! Blocklist of revoked token identifiers.
//!
//! Logout appends the token's jti; every authenticated request asks
//! [`TokenLedger::is_revoked`] before trusting the claims. Records are never
//! pruned.

use std::collections::HashSet;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Revoking the same jti twice is not an error.
    async fn revoke(&self, jti: &str, now: OffsetDateTime) -> anyhow::Result<()>;
    async fn is_revoked(&self, jti: &str) -> anyhow::Result<bool>;
}

/// Ledger backed by the `token_block_list` table.
#[derive(Clone)]
pub struct SqlTokenLedger {
    db: SqlitePool,
}

impl SqlTokenLedger {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenLedger for SqlTokenLedger {
    async fn revoke(&self, jti: &str, now: OffsetDateTime) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO token_block_list (jti, created_at) VALUES (?, ?)")
            .bind(jti)
            .bind(now)
            .execute(&self.db)
            .await
            .context("insert revoked token")?;
        debug!(%jti, "token revoked");
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> anyhow::Result<bool> {
        let hit = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM token_block_list WHERE jti = ? LIMIT 1",
        )
        .bind(jti)
        .fetch_optional(&self.db)
        .await
        .context("lookup revoked token")?;
        Ok(hit.is_some())
    }
}

/// Process-local ledger for single-node setups and tests.
#[derive(Default)]
pub struct MemoryTokenLedger {
    revoked: RwLock<HashSet<String>>,
}

impl MemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenLedger for MemoryTokenLedger {
    async fn revoke(&self, jti: &str, _now: OffsetDateTime) -> anyhow::Result<()> {
        self.revoked.write().await.insert(jti.to_string());
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> anyhow::Result<bool> {
        Ok(self.revoked.read().await.contains(jti))
    }
}
