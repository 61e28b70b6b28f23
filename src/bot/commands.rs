//! Chat command surface.
//!
//! `.monitor` is admin-only and private-message-only; `.channelstats` and
//! `.userstats` only work in channels. Requests that fail those checks are
//! ignored silently. Everything here turns core results into reply text.

use crate::db::CounterRecord;
use crate::error::{MonitorError, PolicyViolation};
use crate::monitor::{AddOutcome, ChannelState, Monitor, Rankings, checked_channel};
use chrono::DateTime;
use std::collections::HashSet;
use tracing::{debug, info, warn};

const MONITOR_USAGE: &str =
    "Usage: .monitor on|off #channel  OR  .monitor add #channel  OR  .monitor list";

/// A recognized chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Monitor(MonitorCommand),
    ChannelStats,
    /// Optional nick; defaults to the requester.
    UserStats(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorCommand {
    On(String),
    Off(String),
    Add(String),
    List,
    Usage,
}

impl BotCommand {
    /// Parse message text starting with `prefix`. Unknown commands yield `None`.
    pub fn parse(prefix: &str, text: &str) -> Option<Self> {
        let body = text.trim_start().strip_prefix(prefix)?;
        let (name, args) = match body.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (body, ""),
        };

        match name.to_ascii_lowercase().as_str() {
            "monitor" => Some(Self::Monitor(MonitorCommand::parse(args))),
            "channelstats" => Some(Self::ChannelStats),
            "userstats" => {
                let nick = args.split_whitespace().next().map(str::to_string);
                Some(Self::UserStats(nick))
            }
            _ => None,
        }
    }
}

impl MonitorCommand {
    fn parse(args: &str) -> Self {
        let args: Vec<&str> = args.split_whitespace().collect();
        let Some(sub) = args.first() else {
            return Self::Usage;
        };

        match (sub.to_ascii_lowercase().as_str(), args.get(1)) {
            ("list", _) => Self::List,
            ("on", Some(channel)) => Self::On(channel.to_string()),
            ("off", Some(channel)) => Self::Off(channel.to_string()),
            ("add", Some(channel)) => Self::Add(channel.to_string()),
            _ => Self::Usage,
        }
    }
}

/// Where a command was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin<'a> {
    Channel(&'a str),
    Private,
}

/// Who sent a command, and what the bot knows about its own presence.
pub struct Request<'a> {
    pub nick: &'a str,
    pub origin: Origin<'a>,
    pub is_admin: bool,
    /// Channels the bot is currently in, normalized.
    pub joined: &'a HashSet<String>,
}

/// One outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub target: String,
    pub text: String,
}

/// Run a command and produce its replies.
pub async fn dispatch(monitor: &Monitor, req: &Request<'_>, command: BotCommand) -> Vec<Reply> {
    match (command, req.origin) {
        (BotCommand::Monitor(cmd), Origin::Private) if req.is_admin => {
            let lines = match monitor_command(monitor, req, cmd).await {
                Ok(lines) => lines,
                Err(err) => vec![describe_error(&err)],
            };
            to(req.nick, lines)
        }
        (BotCommand::ChannelStats, Origin::Channel(channel)) => {
            let lines = match channel_stats(monitor, channel).await {
                Ok(lines) => lines,
                Err(err) => vec![describe_error(&err)],
            };
            to(channel, lines)
        }
        (BotCommand::UserStats(nick), Origin::Channel(channel)) => {
            let nick = nick.as_deref().unwrap_or(req.nick);
            let line = match user_stats(monitor, channel, nick).await {
                Ok(line) => line,
                Err(err) => describe_error(&err),
            };
            to(channel, vec![line])
        }
        _ => Vec::new(),
    }
}

fn to(target: &str, lines: Vec<String>) -> Vec<Reply> {
    lines
        .into_iter()
        .map(|text| Reply {
            target: target.to_string(),
            text,
        })
        .collect()
}

async fn monitor_command(
    monitor: &Monitor,
    req: &Request<'_>,
    cmd: MonitorCommand,
) -> Result<Vec<String>, MonitorError> {
    let admin = &monitor.admin;

    let (channel, enable) = match cmd {
        MonitorCommand::Usage => return Ok(vec![MONITOR_USAGE.to_string()]),
        MonitorCommand::List => {
            let enabled = admin.list().await?;
            return Ok(vec![if enabled.is_empty() {
                "No channels enabled for monitoring.".to_string()
            } else {
                format!("Monitoring enabled in: {}", enabled.join(", "))
            }]);
        }
        MonitorCommand::Add(channel) => {
            let channel = checked_channel(&channel)?;
            let can_add = admin.policy().allow_runtime_add;
            if let Some(line) = absent(monitor, req, &channel, can_add).await? {
                return Ok(vec![line]);
            }
            let line = match admin.add(&channel, Some(req.nick)).await? {
                AddOutcome::Added => format!("Added {} to the eligible channel list.", channel),
                AddOutcome::AlreadyEligible => {
                    format!("{} is already eligible for monitoring.", channel)
                }
            };
            return Ok(vec![line]);
        }
        MonitorCommand::On(channel) => (checked_channel(&channel)?, true),
        MonitorCommand::Off(channel) => (checked_channel(&channel)?, false),
    };

    let policy = admin.policy();
    let can_add = policy.allow_runtime_add && policy.auto_add_on_enable;
    if let Some(line) = absent(monitor, req, &channel, can_add).await? {
        return Ok(vec![line]);
    }

    let transition = if enable {
        admin.enable(&channel, Some(req.nick)).await?
    } else {
        admin.disable(&channel, Some(req.nick)).await?
    };
    info!(
        channel = %transition.channel,
        state = %transition.state,
        by = %req.nick,
        "Admin changed monitoring"
    );

    let mut lines = Vec::new();
    if transition.added {
        lines.push(format!(
            "Added {} to the eligible channel list.",
            transition.channel
        ));
    }
    lines.push(format!(
        "Monitoring {} for {}.",
        if enable { "ENABLED" } else { "DISABLED" },
        transition.channel
    ));
    Ok(lines)
}

/// The "not in channel" reply, if the bot is absent and the admin call could
/// otherwise succeed. A channel that is not eligible and cannot be added is
/// left to Admin Control, whose rejection lists the alternatives.
async fn absent(
    monitor: &Monitor,
    req: &Request<'_>,
    channel: &str,
    can_add: bool,
) -> Result<Option<String>, MonitorError> {
    if req.joined.contains(channel) {
        return Ok(None);
    }
    if !can_add && monitor.admin.state(channel).await? == ChannelState::NotEligible {
        return Ok(None);
    }
    Ok(Some(format!("I'm not currently in {}.", channel)))
}

async fn channel_stats(monitor: &Monitor, channel: &str) -> Result<Vec<String>, MonitorError> {
    if !monitor.gate.should_count(channel).await? {
        return Ok(vec!["Monitoring is not enabled in this channel.".to_string()]);
    }

    let limit = monitor.aggregator.limit();
    match monitor.aggregator.rankings(channel).await? {
        Rankings::Empty => Ok(vec!["No stats yet for this channel.".to_string()]),
        Rankings::Ranked { top, bottom, users } => {
            debug!(channel = %channel, users, "Serving rankings");
            Ok(vec![
                format!("Top {}: {}", limit, format_ranking(&top)),
                format!("Bottom {}: {}", limit, format_ranking(&bottom)),
            ])
        }
    }
}

async fn user_stats(monitor: &Monitor, channel: &str, nick: &str) -> Result<String, MonitorError> {
    if !monitor.gate.should_count(channel).await? {
        return Ok("Monitoring is not enabled in this channel.".to_string());
    }

    // Echo the nick as typed rather than the normalized key
    let record = match monitor.aggregator.user_stats(channel, nick).await {
        Ok(record) => record,
        Err(MonitorError::NotFound { .. }) => {
            return Ok(format!("No stats for {} in {} yet.", nick, channel));
        }
        Err(err) => return Err(err),
    };
    Ok(format!(
        "{} in {}: messages={}, first_seen={}, last_seen={}",
        nick,
        channel,
        record.messages,
        format_ts(record.first_seen),
        format_ts(record.last_seen)
    ))
}

fn format_ranking(records: &[CounterRecord]) -> String {
    records
        .iter()
        .map(|r| format!("{}({})", r.nick, r.messages))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `YYYY-MM-DD HH:MM:SS UTC`.
fn format_ts(ts: i64) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => ts.to_string(),
    }
}

fn describe_error(err: &MonitorError) -> String {
    if err.is_expected() {
        debug!(error = %err, code = err.error_code(), "Command refused");
    } else {
        warn!(error = %err, code = err.error_code(), "Command failed");
    }

    match err {
        MonitorError::NotFound { channel, user } => {
            format!("No stats for {} in {} yet.", user, channel)
        }
        MonitorError::PolicyRejected {
            channel,
            reason,
            eligible,
        } => {
            let current = if eligible.is_empty() {
                "(none configured)".to_string()
            } else {
                eligible.join(", ")
            };
            match reason {
                PolicyViolation::RuntimeAddDisabled => format!(
                    "{} is not in the eligible channel list in config. Eligible: {}. Add it under [channelstats] channels.",
                    channel, current
                ),
                PolicyViolation::NotEligible => format!(
                    "{} is not eligible for monitoring. Eligible: {}. Use .monitor add {} first.",
                    channel, current, channel
                ),
            }
        }
        MonitorError::InvalidChannel(name) => format!("{} is not a valid channel name.", name),
        MonitorError::StoreUnavailable(_) => {
            "Stats are unavailable right now, try again later.".to_string()
        }
    }
}
