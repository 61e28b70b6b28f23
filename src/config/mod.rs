//! Configuration loading and management.
//!
//! - [`types`]: config struct definitions (Config, IrcConfig, ChannelStatsConfig, DatabaseConfig)
//! - [`validation`]: startup checks that report every problem at once

mod types;
mod validation;

pub use types::{ChannelStatsConfig, Config, ConfigError, DatabaseConfig, IrcConfig};
pub use validation::{ValidationError, validate};
