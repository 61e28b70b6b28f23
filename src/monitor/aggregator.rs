//! Message counting and ranking queries.

use super::gate::MonitoringGate;
use super::normalize;
use crate::db::{CounterRecord, Database};
use crate::error::{MonitorError, MonitorResult};
use tracing::debug;

/// One inbound channel message as delivered by the event source.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub channel: String,
    pub user: String,
    /// Seconds since the UNIX epoch.
    pub timestamp: i64,
    /// Authored by the bot itself.
    pub is_self: bool,
}

/// What `record_event` did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Counted,
    SelfMessage,
    NotMonitored,
}

/// Top and bottom lists for a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rankings {
    /// The channel has no counter rows.
    Empty,
    Ranked {
        top: Vec<CounterRecord>,
        bottom: Vec<CounterRecord>,
        /// Distinct users counted in the channel.
        users: i64,
    },
}

#[derive(Clone)]
pub struct CounterAggregator {
    gate: MonitoringGate,
    db: Database,
    limit: u32,
}

impl CounterAggregator {
    pub fn new(gate: MonitoringGate, db: Database, limit: u32) -> Self {
        Self { gate, db, limit }
    }

    /// Entries per ranking list.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count a message if its channel is monitored.
    ///
    /// Self messages are dropped before the gate is consulted.
    pub async fn record_event(&self, event: &MessageEvent) -> MonitorResult<Recorded> {
        if event.is_self {
            return Ok(Recorded::SelfMessage);
        }

        let channel = normalize(&event.channel);
        if !self.gate.should_count(&channel).await? {
            return Ok(Recorded::NotMonitored);
        }

        let user = normalize(&event.user);
        self.db
            .stats()
            .upsert_counter(&channel, &user, event.timestamp)
            .await?;

        debug!(channel = %channel, user = %user, "Message counted");
        Ok(Recorded::Counted)
    }

    /// Most and least active users, `limit` entries each.
    pub async fn rankings(&self, channel: &str) -> MonitorResult<Rankings> {
        let channel = normalize(channel);
        let stats = self.db.stats();

        let users = stats.counter_count(&channel).await?;
        if users == 0 {
            return Ok(Rankings::Empty);
        }
        let top = stats.top_counters(&channel, self.limit).await?;
        let bottom = stats.bottom_counters(&channel, self.limit).await?;

        Ok(Rankings::Ranked { top, bottom, users })
    }

    /// The counter for one user, or `MonitorError::NotFound`.
    pub async fn user_stats(&self, channel: &str, user: &str) -> MonitorResult<CounterRecord> {
        let channel = normalize(channel);
        let user = normalize(user);

        self.db
            .stats()
            .get_counter(&channel, &user)
            .await?
            .ok_or(MonitorError::NotFound { channel, user })
    }
}
