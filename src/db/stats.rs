//! Message counter repository.
//!
//! Keys are stored exactly as given; callers normalize channel and nick
//! before they reach this layer.

use super::DbError;
use sqlx::SqlitePool;

/// Accumulated activity for one nick in one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterRecord {
    pub channel: String,
    pub nick: String,
    pub messages: i64,
    pub first_seen: i64,
    pub last_seen: i64,
}

type CounterRow = (String, String, i64, i64, i64);

fn to_record((channel, nick, messages, first_seen, last_seen): CounterRow) -> CounterRecord {
    CounterRecord {
        channel,
        nick,
        messages,
        first_seen,
        last_seen,
    }
}

/// Repository for counter operations.
pub struct StatsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> StatsRepository<'a> {
    /// Create a new stats repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Count one message.
    ///
    /// Creates the row with `messages = 1` on first sight, otherwise bumps the
    /// count and widens `[first_seen, last_seen]` to cover `ts`, so events
    /// applied out of order keep `first_seen <= last_seen`.
    /// A single statement, so concurrent calls cannot lose an increment.
    pub async fn upsert_counter(&self, channel: &str, nick: &str, ts: i64) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO stats (channel, nick, messages, first_seen, last_seen)
            VALUES (?, ?, 1, ?, ?)
            ON CONFLICT(channel, nick) DO UPDATE SET
                messages = messages + 1,
                first_seen = MIN(first_seen, excluded.first_seen),
                last_seen = MAX(last_seen, excluded.last_seen)
            "#,
        )
        .bind(channel)
        .bind(nick)
        .bind(ts)
        .bind(ts)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Find the counter for one nick in one channel.
    pub async fn get_counter(
        &self,
        channel: &str,
        nick: &str,
    ) -> Result<Option<CounterRecord>, DbError> {
        let row = sqlx::query_as::<_, CounterRow>(
            r#"
            SELECT channel, nick, messages, first_seen, last_seen
            FROM stats
            WHERE channel = ? AND nick = ?
            "#,
        )
        .bind(channel)
        .bind(nick)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(to_record))
    }

    /// Most active nicks first; equal counts ordered by nick.
    pub async fn top_counters(
        &self,
        channel: &str,
        limit: u32,
    ) -> Result<Vec<CounterRecord>, DbError> {
        let rows = sqlx::query_as::<_, CounterRow>(
            r#"
            SELECT channel, nick, messages, first_seen, last_seen
            FROM stats
            WHERE channel = ?
            ORDER BY messages DESC, nick ASC
            LIMIT ?
            "#,
        )
        .bind(channel)
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(to_record).collect())
    }

    /// Least active nicks first; equal counts ordered by nick.
    pub async fn bottom_counters(
        &self,
        channel: &str,
        limit: u32,
    ) -> Result<Vec<CounterRecord>, DbError> {
        let rows = sqlx::query_as::<_, CounterRow>(
            r#"
            SELECT channel, nick, messages, first_seen, last_seen
            FROM stats
            WHERE channel = ?
            ORDER BY messages ASC, nick ASC
            LIMIT ?
            "#,
        )
        .bind(channel)
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(to_record).collect())
    }

    /// Number of counter rows (distinct nicks) for a channel.
    pub async fn counter_count(&self, channel: &str) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stats WHERE channel = ?")
            .bind(channel)
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    async fn seed(db: &Database, channel: &str, counts: &[(&str, usize)]) {
        for (nick, count) in counts {
            for i in 0..*count {
                db.stats()
                    .upsert_counter(channel, nick, 1000 + i as i64)
                    .await
                    .unwrap();
            }
        }
    }

    fn nicks(records: &[super::CounterRecord]) -> Vec<(&str, i64)> {
        records
            .iter()
            .map(|r| (r.nick.as_str(), r.messages))
            .collect()
    }

    #[tokio::test]
    async fn first_upsert_creates_row() {
        let db = Database::new(":memory:").await.unwrap();
        db.stats().upsert_counter("#rust", "alice", 42).await.unwrap();

        let record = db.stats().get_counter("#rust", "alice").await.unwrap().unwrap();
        assert_eq!(record.messages, 1);
        assert_eq!(record.first_seen, 42);
        assert_eq!(record.last_seen, 42);
    }

    #[tokio::test]
    async fn later_upserts_keep_first_seen() {
        let db = Database::new(":memory:").await.unwrap();
        db.stats().upsert_counter("#rust", "alice", 10).await.unwrap();
        db.stats().upsert_counter("#rust", "alice", 20).await.unwrap();
        db.stats().upsert_counter("#rust", "alice", 30).await.unwrap();

        let record = db.stats().get_counter("#rust", "alice").await.unwrap().unwrap();
        assert_eq!(record.messages, 3);
        assert_eq!(record.first_seen, 10);
        assert_eq!(record.last_seen, 30);
    }

    #[tokio::test]
    async fn out_of_order_upserts_keep_range_ordered() {
        let db = Database::new(":memory:").await.unwrap();
        db.stats().upsert_counter("#a", "alice", 100).await.unwrap();
        db.stats().upsert_counter("#a", "alice", 50).await.unwrap();
        db.stats().upsert_counter("#a", "alice", 75).await.unwrap();

        let record = db.stats().get_counter("#a", "alice").await.unwrap().unwrap();
        assert_eq!(record.messages, 3);
        assert_eq!(record.first_seen, 50);
        assert_eq!(record.last_seen, 100);
    }

    #[tokio::test]
    async fn counters_are_scoped_per_channel() {
        let db = Database::new(":memory:").await.unwrap();
        db.stats().upsert_counter("#rust", "alice", 1).await.unwrap();
        db.stats().upsert_counter("#go", "alice", 1).await.unwrap();
        db.stats().upsert_counter("#go", "alice", 2).await.unwrap();

        let rust = db.stats().get_counter("#rust", "alice").await.unwrap().unwrap();
        let go = db.stats().get_counter("#go", "alice").await.unwrap().unwrap();
        assert_eq!(rust.messages, 1);
        assert_eq!(go.messages, 2);
        assert_eq!(db.stats().counter_count("#rust").await.unwrap(), 1);
        assert_eq!(db.stats().counter_count("#empty").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn get_missing_counter_is_none() {
        let db = Database::new(":memory:").await.unwrap();
        assert!(db.stats().get_counter("#rust", "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn top_breaks_ties_by_nick() {
        let db = Database::new(":memory:").await.unwrap();
        seed(&db, "#rust", &[("carol", 3), ("bob", 5), ("alice", 5)]).await;

        let top = db.stats().top_counters("#rust", 2).await.unwrap();
        assert_eq!(nicks(&top), vec![("alice", 5), ("bob", 5)]);
    }

    #[tokio::test]
    async fn bottom_is_ascending_with_nick_tiebreak() {
        let db = Database::new(":memory:").await.unwrap();
        seed(&db, "#rust", &[("carol", 3), ("bob", 5), ("alice", 5)]).await;

        let bottom = db.stats().bottom_counters("#rust", 2).await.unwrap();
        assert_eq!(nicks(&bottom), vec![("carol", 3), ("alice", 5)]);
    }

    #[tokio::test]
    async fn limit_caps_result_size() {
        let db = Database::new(":memory:").await.unwrap();
        seed(
            &db,
            "#rust",
            &[("a", 1), ("b", 2), ("c", 3), ("d", 4), ("e", 5)],
        )
        .await;

        assert_eq!(db.stats().top_counters("#rust", 3).await.unwrap().len(), 3);
        assert_eq!(db.stats().top_counters("#rust", 50).await.unwrap().len(), 5);
        assert!(db.stats().top_counters("#other", 10).await.unwrap().is_empty());
    }
}
