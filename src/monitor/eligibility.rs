//! Which channels may be monitored at all.
//!
//! The eligible set is the configured list merged with the channels admins
//! added at runtime. Nothing is cached: every check reads the store.

use super::normalize;
use crate::db::Database;
use crate::error::MonitorResult;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::trace;

#[derive(Clone)]
pub struct EligibilityResolver {
    configured: Arc<BTreeSet<String>>,
    db: Database,
}

impl EligibilityResolver {
    pub fn new<I, S>(configured: I, db: Database) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let configured = configured
            .into_iter()
            .map(|c| normalize(c.as_ref()))
            .filter(|c| !c.is_empty())
            .collect();

        Self {
            configured: Arc::new(configured),
            db,
        }
    }

    /// In the static configured list. Never touches the store.
    pub fn is_configured(&self, channel: &str) -> bool {
        self.configured.contains(&normalize(channel))
    }

    /// In the configured list or added at runtime.
    ///
    /// The configured set is checked first so the common case needs no store read.
    pub async fn is_eligible(&self, channel: &str) -> MonitorResult<bool> {
        if self.is_configured(channel) {
            return Ok(true);
        }
        let channel = normalize(channel);

        match self.db.monitoring().get_eligible_channel(&channel).await? {
            Some(entry) => {
                trace!(
                    channel = %entry.channel,
                    added_by = ?entry.added_by,
                    since = entry.updated_at,
                    "Eligible via runtime addition"
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The full eligible set, sorted.
    pub async fn eligible_channels(&self) -> MonitorResult<Vec<String>> {
        let mut all: BTreeSet<String> = self.configured.as_ref().clone();
        let stored = self.db.monitoring().list_eligible_channels().await?;
        all.extend(
            stored
                .iter()
                .map(|c| normalize(c))
                .filter(|c| !c.is_empty()),
        );

        Ok(all.into_iter().collect())
    }
}
