//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use crate::monitor::{is_valid_channel, normalize};
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("irc.server is required")]
    MissingServer,
    #[error("irc.server must be host:port, got '{0}'")]
    InvalidServer(String),
    #[error("irc.nick is required")]
    MissingNick,
    #[error("irc.nick must not contain spaces, got '{0}'")]
    InvalidNick(String),
    #[error("irc.admins contains an empty nick")]
    EmptyAdmin,
    #[error("irc.command_prefix is required")]
    MissingCommandPrefix,
    #[error("channelstats.channels entry is not a channel name: '{0}'")]
    InvalidChannel(String),
    #[error("channelstats.ranking_limit must be at least 1")]
    ZeroRankingLimit,
    #[error("database.path is required")]
    MissingDatabasePath,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let server = config.irc.server.trim();
    if server.is_empty() {
        errors.push(ValidationError::MissingServer);
    } else {
        let valid = server
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !valid {
            errors.push(ValidationError::InvalidServer(server.to_string()));
        }
    }

    let nick = config.irc.nick.trim();
    if nick.is_empty() {
        errors.push(ValidationError::MissingNick);
    } else if nick.contains(char::is_whitespace) {
        errors.push(ValidationError::InvalidNick(nick.to_string()));
    }

    if config.irc.admins.iter().any(|a| a.trim().is_empty()) {
        errors.push(ValidationError::EmptyAdmin);
    }

    if config.irc.command_prefix.is_empty() {
        errors.push(ValidationError::MissingCommandPrefix);
    }

    for channel in &config.channelstats.channels {
        let normalized = normalize(channel);
        if !normalized.is_empty() && !is_valid_channel(&normalized) {
            errors.push(ValidationError::InvalidChannel(channel.clone()));
        }
    }

    if config.channelstats.ranking_limit == 0 {
        errors.push(ValidationError::ZeroRankingLimit);
    }

    if config.database.path.trim().is_empty() {
        errors.push(ValidationError::MissingDatabasePath);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
