//! Monitoring core: who may be counted, and the counters themselves.
//!
//! - [`eligibility`]: configured list merged with runtime additions
//! - [`enablement`]: persisted on/off override over a global default
//! - [`gate`]: eligible AND enabled, per inbound message
//! - [`aggregator`]: counting and ranking queries
//! - [`admin`]: the admin state machine over the two layers
//!
//! Every component holds a clone of the same [`Database`] handle; the store
//! serializes access, so none of them keeps a lock or a cache.

pub mod admin;
pub mod aggregator;
pub mod clock;
pub mod eligibility;
pub mod enablement;
pub mod gate;

pub use admin::{AddOutcome, AdminControl, AdminPolicy, ChannelState, Transition};
pub use aggregator::{CounterAggregator, MessageEvent, Rankings, Recorded};
pub use clock::{Clock, SystemClock};
pub use eligibility::EligibilityResolver;
pub use enablement::EnablementResolver;
pub use gate::MonitoringGate;

use crate::config::ChannelStatsConfig;
use crate::db::Database;
use crate::error::{MonitorError, MonitorResult};
use std::sync::Arc;

/// Case-normalize a channel or nick: trimmed and lowercased.
///
/// Uses the rfc1459 case mapping, so `[]\~` fold to `{}|^` and `[bot]` and
/// `{Bot}` name the same user. Non-ASCII letters are lowercased as Unicode.
pub fn normalize(name: &str) -> String {
    let name = name.trim();
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '[' => out.push('{'),
            ']' => out.push('}'),
            '\\' => out.push('|'),
            '~' => out.push('^'),
            _ => out.extend(c.to_lowercase()),
        }
    }
    out
}

/// Channel names start with `#` or `&` and carry no spaces, commas or
/// control characters.
pub fn is_valid_channel(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some('#') | Some('&') => {}
        _ => return false,
    }

    let rest = chars.as_str();
    !rest.is_empty() && !rest.chars().any(|c| c == ' ' || c == ',' || c.is_control())
}

/// Normalize a channel name and reject it unless it is well formed.
pub(crate) fn checked_channel(channel: &str) -> MonitorResult<String> {
    let normalized = normalize(channel);
    if is_valid_channel(&normalized) {
        Ok(normalized)
    } else {
        Err(MonitorError::InvalidChannel(channel.trim().to_string()))
    }
}

/// All monitoring components wired to one store.
#[derive(Clone)]
pub struct Monitor {
    pub gate: MonitoringGate,
    pub aggregator: CounterAggregator,
    pub admin: AdminControl,
}

impl Monitor {
    pub fn new(db: Database, config: &ChannelStatsConfig, clock: Arc<dyn Clock>) -> Self {
        let eligibility = EligibilityResolver::new(config.normalized_channels(), db.clone());
        let enablement = EnablementResolver::new(config.default_enabled, db.clone());
        let gate = MonitoringGate::new(eligibility.clone(), enablement.clone());
        let aggregator = CounterAggregator::new(gate.clone(), db.clone(), config.ranking_limit);
        let admin = AdminControl::new(
            eligibility,
            enablement,
            db,
            AdminPolicy {
                allow_runtime_add: config.allow_admin_add,
                auto_add_on_enable: config.auto_add_on_enable,
            },
            clock,
        );

        Self {
            gate,
            aggregator,
            admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize("  #Rust "), "#rust");
        assert_eq!(normalize("ALICE"), "alice");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn normalize_folds_rfc1459_specials() {
        assert_eq!(normalize("[Bot]"), "{bot}");
        assert_eq!(normalize("{bot}"), "{bot}");
        assert_eq!(normalize("A\\b~"), "a|b^");
        assert_eq!(normalize("#Ünï"), "#ünï");
    }

    #[test]
    fn checked_channel_normalizes_or_rejects() {
        assert_eq!(checked_channel(" #Rust ").unwrap(), "#rust");
        assert!(matches!(
            checked_channel(" nochan "),
            Err(MonitorError::InvalidChannel(name)) if name == "nochan"
        ));
    }

    #[test]
    fn channel_name_rules() {
        assert!(is_valid_channel("#rust"));
        assert!(is_valid_channel("&local"));
        assert!(is_valid_channel("##offtopic"));
        assert!(!is_valid_channel("rust"));
        assert!(!is_valid_channel("#"));
        assert!(!is_valid_channel(""));
        assert!(!is_valid_channel("#a b"));
        assert!(!is_valid_channel("#a,#b"));
        assert!(!is_valid_channel("#bell\x07"));
    }

    #[tokio::test]
    async fn monitor_wires_config_into_components() {
        let db = Database::new(":memory:").await.unwrap();
        let config = ChannelStatsConfig {
            channels: vec!["#A".to_string()],
            allow_admin_add: true,
            default_enabled: false,
            auto_add_on_enable: false,
            ranking_limit: 3,
        };
        let monitor = Monitor::new(db, &config, Arc::new(SystemClock));

        assert_eq!(monitor.aggregator.limit(), 3);
        assert_eq!(
            monitor.admin.policy(),
            AdminPolicy {
                allow_runtime_add: true,
                auto_add_on_enable: false,
            }
        );
        assert!(!monitor.gate.should_count("#a").await.unwrap());

        monitor.admin.enable("#a", None).await.unwrap();
        assert!(monitor.gate.should_count("#a").await.unwrap());

        let event = MessageEvent {
            channel: "#a".to_string(),
            user: "alice".to_string(),
            timestamp: 7,
            is_self: false,
        };
        assert_eq!(
            monitor.aggregator.record_event(&event).await.unwrap(),
            Recorded::Counted
        );
    }
}
