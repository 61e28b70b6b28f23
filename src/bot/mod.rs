//! IRC front end for the monitoring core.
//!
//! Lines are parsed and built with `irc_proto`'s `Message`/`Command` model.
//!
//! - [`commands`]: `.monitor`, `.channelstats` and `.userstats`
//! - [`connection`]: the client connection loop

pub mod commands;
pub mod connection;

pub use connection::{BotError, Disconnect, run};
