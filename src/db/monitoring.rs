//! Eligibility and enablement repository.
//!
//! Two small tables: `eligible_channels` (channels an admin added at runtime)
//! and `enabled_channels` (explicit on/off overrides).

use super::DbError;
use sqlx::SqlitePool;
use std::collections::BTreeSet;

/// Persisted on/off override for a channel.
///
/// `Unset` means no row exists and the configured default applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enablement {
    Unset,
    On,
    Off,
}

impl Enablement {
    /// Collapse to a boolean, using `default` for `Unset`.
    pub fn resolve(self, default: bool) -> bool {
        match self {
            Enablement::Unset => default,
            Enablement::On => true,
            Enablement::Off => false,
        }
    }
}

impl From<Option<bool>> for Enablement {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Enablement::Unset,
            Some(true) => Enablement::On,
            Some(false) => Enablement::Off,
        }
    }
}

const UPSERT_ENABLED: &str = r#"
    INSERT INTO enabled_channels (channel, enabled, updated_at)
    VALUES (?, ?, ?)
    ON CONFLICT(channel) DO UPDATE SET
        enabled = excluded.enabled,
        updated_at = excluded.updated_at
"#;

const UPSERT_ELIGIBLE: &str = r#"
    INSERT INTO eligible_channels (channel, added_by, updated_at)
    VALUES (?, ?, ?)
    ON CONFLICT(channel) DO UPDATE SET
        added_by = excluded.added_by,
        updated_at = excluded.updated_at
"#;

/// A channel added to the eligible list at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibleChannel {
    pub channel: String,
    pub added_by: Option<String>,
    pub updated_at: i64,
}

/// Repository for eligibility and enablement rows.
pub struct MonitoringRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MonitoringRepository<'a> {
    /// Create a new monitoring repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Set the on/off override for a channel.
    pub async fn set_enabled(&self, channel: &str, enabled: bool, ts: i64) -> Result<(), DbError> {
        sqlx::query(UPSERT_ENABLED)
            .bind(channel)
            .bind(enabled)
            .bind(ts)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Read the on/off override for a channel.
    pub async fn get_enabled(&self, channel: &str) -> Result<Enablement, DbError> {
        let enabled: Option<bool> =
            sqlx::query_scalar("SELECT enabled FROM enabled_channels WHERE channel = ?")
                .bind(channel)
                .fetch_optional(self.pool)
                .await?;

        Ok(Enablement::from(enabled))
    }

    /// Add a channel to the runtime eligible list.
    ///
    /// Re-adding an existing channel refreshes `added_by` and `updated_at`.
    pub async fn add_eligible_channel(
        &self,
        channel: &str,
        added_by: Option<&str>,
        ts: i64,
    ) -> Result<(), DbError> {
        sqlx::query(UPSERT_ELIGIBLE)
            .bind(channel)
            .bind(added_by)
            .bind(ts)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Add a channel to the eligible list and set its override in one
    /// transaction. Either both rows are written or neither is.
    pub async fn add_and_set_enabled(
        &self,
        channel: &str,
        added_by: Option<&str>,
        enabled: bool,
        ts: i64,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(UPSERT_ELIGIBLE)
            .bind(channel)
            .bind(added_by)
            .bind(ts)
            .execute(&mut *tx)
            .await?;

        sqlx::query(UPSERT_ENABLED)
            .bind(channel)
            .bind(enabled)
            .bind(ts)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Look up one runtime-added channel.
    pub async fn get_eligible_channel(
        &self,
        channel: &str,
    ) -> Result<Option<EligibleChannel>, DbError> {
        let row = sqlx::query_as::<_, (String, Option<String>, i64)>(
            "SELECT channel, added_by, updated_at FROM eligible_channels WHERE channel = ?",
        )
        .bind(channel)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(channel, added_by, updated_at)| EligibleChannel {
            channel,
            added_by,
            updated_at,
        }))
    }

    /// All runtime-added channels.
    pub async fn list_eligible_channels(&self) -> Result<BTreeSet<String>, DbError> {
        let rows: Vec<String> = sqlx::query_scalar("SELECT channel FROM eligible_channels")
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().collect())
    }
}
