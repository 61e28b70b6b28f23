//! Whether monitoring is switched on for a channel.

use super::normalize;
use crate::db::{Database, Enablement};
use crate::error::MonitorResult;

/// Resolves the persisted override against the process-wide default.
#[derive(Clone)]
pub struct EnablementResolver {
    default_enabled: bool,
    db: Database,
}

impl EnablementResolver {
    pub fn new(default_enabled: bool, db: Database) -> Self {
        Self {
            default_enabled,
            db,
        }
    }

    /// The raw three-valued override.
    pub async fn enablement(&self, channel: &str) -> MonitorResult<Enablement> {
        Ok(self.db.monitoring().get_enabled(&normalize(channel)).await?)
    }

    pub async fn is_enabled(&self, channel: &str) -> MonitorResult<bool> {
        Ok(self
            .enablement(channel)
            .await?
            .resolve(self.default_enabled))
    }
}
