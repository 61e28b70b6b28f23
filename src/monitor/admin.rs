//! Admin Control: the only runtime mutator of eligibility and enablement.
//!
//! Callers are trusted to have verified admin privilege already; nothing here
//! checks who is asking. Every transition is written straight to the store,
//! so the next gate check sees it.
//!
//! ```text
//!   NotEligible --add--> EligibleDisabled <--enable/disable--> EligibleEnabled
//! ```
//!
//! `add` only changes eligibility. With `default_enabled = true` a freshly
//! added channel without an override therefore resolves to `EligibleEnabled`.

use super::clock::Clock;
use super::eligibility::EligibilityResolver;
use super::enablement::EnablementResolver;
use super::{checked_channel, normalize};
use crate::db::Database;
use crate::error::{MonitorError, MonitorResult, PolicyViolation};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Monitoring status of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    NotEligible,
    EligibleDisabled,
    EligibleEnabled,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotEligible => f.write_str("not eligible"),
            Self::EligibleDisabled => f.write_str("disabled"),
            Self::EligibleEnabled => f.write_str("enabled"),
        }
    }
}

/// Policy knobs fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminPolicy {
    /// Admins may add channels beyond the configured list.
    pub allow_runtime_add: bool,
    /// `enable`/`disable` on a non-eligible channel runs `add` first.
    /// Has no effect unless `allow_runtime_add` is set.
    pub auto_add_on_enable: bool,
}

/// Result of `add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The channel was not eligible before.
    Added,
    AlreadyEligible,
}

/// Result of `enable`/`disable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub channel: String,
    /// The channel had to be added to the eligible list first.
    pub added: bool,
    pub state: ChannelState,
}

#[derive(Clone)]
pub struct AdminControl {
    eligibility: EligibilityResolver,
    enablement: EnablementResolver,
    db: Database,
    policy: AdminPolicy,
    clock: Arc<dyn Clock>,
}

impl AdminControl {
    pub fn new(
        eligibility: EligibilityResolver,
        enablement: EnablementResolver,
        db: Database,
        policy: AdminPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            eligibility,
            enablement,
            db,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> AdminPolicy {
        self.policy
    }

    pub async fn state(&self, channel: &str) -> MonitorResult<ChannelState> {
        let channel = normalize(channel);
        if !self.eligibility.is_eligible(&channel).await? {
            return Ok(ChannelState::NotEligible);
        }

        if self.enablement.is_enabled(&channel).await? {
            Ok(ChannelState::EligibleEnabled)
        } else {
            Ok(ChannelState::EligibleDisabled)
        }
    }

    /// Make a channel eligible.
    ///
    /// When runtime addition is allowed the row is always written, so a repeat
    /// call refreshes `added_by` and the timestamp. When it is not allowed, an
    /// already-eligible channel is accepted without a write and anything else
    /// is rejected.
    pub async fn add(&self, channel: &str, by: Option<&str>) -> MonitorResult<AddOutcome> {
        let channel = checked_channel(channel)?;
        let was_eligible = self.eligibility.is_eligible(&channel).await?;

        if !self.policy.allow_runtime_add {
            if was_eligible {
                return Ok(AddOutcome::AlreadyEligible);
            }
            return Err(self
                .rejection(channel, PolicyViolation::RuntimeAddDisabled)
                .await);
        }

        self.db
            .monitoring()
            .add_eligible_channel(&channel, by, self.clock.now())
            .await?;

        if was_eligible {
            Ok(AddOutcome::AlreadyEligible)
        } else {
            info!(channel = %channel, by = ?by, "Channel added to eligible list");
            Ok(AddOutcome::Added)
        }
    }

    pub async fn enable(&self, channel: &str, by: Option<&str>) -> MonitorResult<Transition> {
        self.set_enabled(channel, true, by).await
    }

    pub async fn disable(&self, channel: &str, by: Option<&str>) -> MonitorResult<Transition> {
        self.set_enabled(channel, false, by).await
    }

    /// Channels currently in `EligibleEnabled`, sorted.
    pub async fn list(&self) -> MonitorResult<Vec<String>> {
        let mut enabled = Vec::new();
        for channel in self.eligibility.eligible_channels().await? {
            if self.enablement.is_enabled(&channel).await? {
                enabled.push(channel);
            }
        }
        Ok(enabled)
    }

    /// The full eligible set, sorted.
    pub async fn eligible(&self) -> MonitorResult<Vec<String>> {
        self.eligibility.eligible_channels().await
    }

    async fn set_enabled(
        &self,
        channel: &str,
        enabled: bool,
        by: Option<&str>,
    ) -> MonitorResult<Transition> {
        let channel = checked_channel(channel)?;

        let added = !self.eligibility.is_eligible(&channel).await?;
        if added {
            if !(self.policy.allow_runtime_add && self.policy.auto_add_on_enable) {
                let reason = if self.policy.allow_runtime_add {
                    PolicyViolation::NotEligible
                } else {
                    PolicyViolation::RuntimeAddDisabled
                };
                return Err(self.rejection(channel, reason).await);
            }

            // Eligibility and override commit together or not at all
            self.db
                .monitoring()
                .add_and_set_enabled(&channel, by, enabled, self.clock.now())
                .await?;
            info!(channel = %channel, by = ?by, "Channel added to eligible list");
        } else {
            self.db
                .monitoring()
                .set_enabled(&channel, enabled, self.clock.now())
                .await?;
        }

        info!(channel = %channel, enabled, by = ?by, "Monitoring state changed");

        let state = if enabled {
            ChannelState::EligibleEnabled
        } else {
            ChannelState::EligibleDisabled
        };
        Ok(Transition {
            channel,
            added,
            state,
        })
    }

    /// Build a policy error carrying the current eligible set.
    ///
    /// If the store cannot be read for the list, that failure wins.
    async fn rejection(&self, channel: String, reason: PolicyViolation) -> MonitorError {
        match self.eligibility.eligible_channels().await {
            Ok(eligible) => MonitorError::PolicyRejected {
                channel,
                reason,
                eligible,
            },
            Err(err) => err,
        }
    }
}
