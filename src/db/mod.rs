//! Database module for persistent storage.
//!
//! Provides async SQLite access using SQLx for:
//! - Per-channel, per-nick message counters
//! - Runtime monitoring on/off overrides
//! - Channels added to the eligible list by admins
//!
//! Every statement goes through a pool capped at one connection, so all
//! reads and writes are serialized behind a single boundary. Callers never
//! hold a lock of their own.

mod monitoring;
mod stats;

pub use monitoring::{EligibleChannel, Enablement, MonitoringRepository};
pub use stats::{CounterRecord, StatsRepository};

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
    #[error("migration error: {0}")]
    Migration(sqlx::migrate::MigrateError),
}

/// Database handle with a single-connection pool.
///
/// Cloning is cheap; all clones share the same pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connection acquire timeout. A caller waiting longer than this gets a
    /// pool timeout error instead of hanging.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// SQLite lock-wait timeout for a busy database file.
    const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time the connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Open (or create) a database, running migrations if needed.
    ///
    /// `":memory:"` opens a private in-memory database.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let pool = if path == ":memory:" {
            // A uniquely named shared-cache database per call, so parallel
            // tests never see each other's rows.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:chanstats-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );

            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .busy_timeout(Self::BUSY_TIMEOUT)
                .create_if_missing(true);

            // No idle timeout: closing the last connection drops the data.
            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(None)
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .busy_timeout(Self::BUSY_TIMEOUT)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        };

        info!(path = %path, "Database connected");

        Self::run_migrations(&pool).await?;

        // Refuse to run on top of a corrupted file
        let integrity_result: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&pool)
            .await?;

        if integrity_result != "ok" {
            tracing::error!(
                integrity_check = %integrity_result,
                "Database integrity check FAILED - corruption detected!"
            );
            return Err(DbError::Sqlx(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Database integrity check failed: {}", integrity_result),
            ))));
        }

        Ok(Self { pool })
    }

    /// Run embedded migrations.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(DbError::Migration)?;

        info!("Database migrations checked/applied");
        Ok(())
    }

    /// Get reference to the underlying connection pool.
    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the message counter repository.
    pub fn stats(&self) -> StatsRepository<'_> {
        StatsRepository::new(&self.pool)
    }

    /// Get the eligibility/enablement repository.
    pub fn monitoring(&self) -> MonitoringRepository<'_> {
        MonitoringRepository::new(&self.pool)
    }

    /// Close the pool, waiting for the connection to be released.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::Sqlx(err)
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn memory_databases_are_isolated() {
        let a = Database::new(":memory:").await.unwrap();
        let b = Database::new(":memory:").await.unwrap();

        a.stats().upsert_counter("#rust", "alice", 100).await.unwrap();

        assert!(a.stats().get_counter("#rust", "alice").await.unwrap().is_some());
        assert!(b.stats().get_counter("#rust", "alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("monitor.db");
        let path = path.to_str().unwrap().to_string();

        {
            let db = Database::new(&path).await.unwrap();
            db.stats().upsert_counter("#rust", "alice", 100).await.unwrap();
            db.stats().upsert_counter("#rust", "alice", 160).await.unwrap();
            db.monitoring().set_enabled("#rust", true, 100).await.unwrap();
            db.monitoring()
                .add_eligible_channel("#rust", Some("admin"), 100)
                .await
                .unwrap();
            db.close().await;
        }

        let db = Database::new(&path).await.unwrap();
        let record = db.stats().get_counter("#rust", "alice").await.unwrap().unwrap();
        assert_eq!(record.messages, 2);
        assert_eq!(record.first_seen, 100);
        assert_eq!(record.last_seen, 160);
        assert_eq!(
            db.monitoring().get_enabled("#rust").await.unwrap(),
            Enablement::On
        );
        assert!(
            db.monitoring()
                .list_eligible_channels()
                .await
                .unwrap()
                .contains("#rust")
        );
    }

    #[tokio::test]
    async fn closed_pool_reports_error() {
        let db = Database::new(":memory:").await.unwrap();
        db.close().await;

        let result = db.stats().upsert_counter("#rust", "alice", 1).await;
        assert!(matches!(result, Err(DbError::Sqlx(_))));
    }
}
