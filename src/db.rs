use std::{
    ops::{Deref, DerefMut},
    str::FromStr,
};

use anyhow::Context;
use sqlx::{
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Sqlite, SqliteConnection, SqlitePool,
};
use tracing::{info, warn};

use crate::config::AppConfig;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub async fn connect(config: &AppConfig) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .with_context(|| format!("parse database url {}", config.database_url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        // SQLite ships with foreign keys disabled
        .foreign_keys(true);

    let db = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .context("connect to database")?;
    info!(max_connections = config.max_connections, "database pool created");
    Ok(db)
}

/// Single-connection in-memory database; every new connection would see an
/// empty schema, so the pool must never recycle it.
pub async fn connect_in_memory() -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .context("parse in-memory url")?
        .foreign_keys(true);

    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .context("connect to in-memory database")?;
    Ok(db)
}

pub async fn migrate(db: &SqlitePool) -> anyhow::Result<()> {
    MIGRATOR.run(db).await.context("run migrations")?;
    info!("migrations applied");
    Ok(())
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.is_unique_violation())
}

pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.is_foreign_key_violation())
}

/// Transaction holding SQLite's write lock from `BEGIN IMMEDIATE` on.
///
/// With a deferred `BEGIN` the first SELECT pins a read snapshot, and a later
/// write fails with SQLITE_BUSY_SNAPSHOT once another connection has
/// committed. Immediate transactions queue on `busy_timeout` instead, so every
/// check they run sees the latest committed state.
///
/// Dropping it without [`WriteTx::commit`] rolls back before the connection
/// goes back to the pool.
pub struct WriteTx {
    conn: Option<PoolConnection<Sqlite>>,
}

pub async fn begin_write(db: &SqlitePool) -> sqlx::Result<WriteTx> {
    let mut conn = db.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(WriteTx { conn: Some(conn) })
}

impl WriteTx {
    pub async fn commit(mut self) -> sqlx::Result<()> {
        if let Some(conn) = self.conn.as_mut() {
            sqlx::query("COMMIT").execute(&mut **conn).await?;
        }
        self.conn = None;
        Ok(())
    }
}

impl Deref for WriteTx {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        self.conn.as_deref().expect("connection is held until commit or drop")
    }
}

impl DerefMut for WriteTx {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        self.conn
            .as_deref_mut()
            .expect("connection is held until commit or drop")
    }
}

impl Drop for WriteTx {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                        warn!(error = %e, "rollback failed");
                    }
                });
            }
            // no runtime to roll back on: close instead of pooling an open transaction
            Err(_) => drop(conn.detach()),
        }
    }
}

/// True when a trigger aborted the statement with `RAISE(ABORT, marker)`.
pub fn is_raised(err: &sqlx::Error, marker: &str) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.message().contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_pool_migrates() {
        let db = connect_in_memory().await.expect("pool");
        migrate(&db).await.expect("migrate");

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&db)
        .await
        .expect("list tables");
        for t in ["items", "items_tags", "stores", "tags", "token_block_list", "users"] {
            assert!(tables.iter().any(|n| n == t), "missing table {t}");
        }
    }

    #[tokio::test]
    async fn unique_violation_is_classified() {
        let db = connect_in_memory().await.expect("pool");
        migrate(&db).await.expect("migrate");

        sqlx::query("INSERT INTO stores (name) VALUES ('a')")
            .execute(&db)
            .await
            .expect("first insert");
        let err = sqlx::query("INSERT INTO stores (name) VALUES ('a')")
            .execute(&db)
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(!is_foreign_key_violation(&err));
    }

    #[tokio::test]
    async fn dropped_write_tx_rolls_back() {
        let db = connect_in_memory().await.expect("pool");
        migrate(&db).await.expect("migrate");

        {
            let mut tx = begin_write(&db).await.expect("begin");
            sqlx::query("INSERT INTO stores (name) VALUES ('gone')")
                .execute(&mut *tx)
                .await
                .expect("insert");
        }
        let mut tx = begin_write(&db).await.expect("begin after rollback");
        sqlx::query("INSERT INTO stores (name) VALUES ('kept')")
            .execute(&mut *tx)
            .await
            .expect("insert");
        tx.commit().await.expect("commit");

        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM stores")
            .fetch_all(&db)
            .await
            .expect("list stores");
        assert_eq!(names, vec!["kept".to_string()]);
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let db = connect_in_memory().await.expect("pool");
        migrate(&db).await.expect("migrate");

        let err = sqlx::query("INSERT INTO items (name, price, store_id) VALUES ('x', 1.0, 42)")
            .execute(&db)
            .await
            .unwrap_err();
        assert!(is_foreign_key_violation(&err));
    }
}
