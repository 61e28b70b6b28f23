//! Admission decision for incoming messages.

use super::eligibility::EligibilityResolver;
use super::enablement::EnablementResolver;
use crate::error::MonitorResult;

/// Eligible AND enabled.
#[derive(Clone)]
pub struct MonitoringGate {
    eligibility: EligibilityResolver,
    enablement: EnablementResolver,
}

impl MonitoringGate {
    pub fn new(eligibility: EligibilityResolver, enablement: EnablementResolver) -> Self {
        Self {
            eligibility,
            enablement,
        }
    }

    /// Whether a message in `channel` should be counted.
    ///
    /// The enablement row is only read for eligible channels.
    pub async fn should_count(&self, channel: &str) -> MonitorResult<bool> {
        if !self.eligibility.is_eligible(channel).await? {
            return Ok(false);
        }
        self.enablement.is_enabled(channel).await
    }
}
