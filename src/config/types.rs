//! Core configuration types and loading.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::monitor::normalize;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// IRC connection and identity.
    pub irc: IrcConfig,
    /// Monitoring policy.
    #[serde(default)]
    pub channelstats: ChannelStatsConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// IRC network and bot identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IrcConfig {
    /// Server address as `host:port` (e.g., "irc.libera.chat:6667").
    pub server: String,
    /// Bot nickname.
    pub nick: String,
    /// USER name (defaults to the nick).
    #[serde(default)]
    pub username: Option<String>,
    /// USER realname.
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Extra channels to join that are not monitoring candidates.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Nicks allowed to use `.monitor` in private messages.
    #[serde(default)]
    pub admins: Vec<String>,
    /// Prefix for chat commands (default: ".").
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Seconds to wait before reconnecting after a disconnect (default: 30).
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

impl IrcConfig {
    /// USER name, falling back to the nick.
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.nick)
    }

    /// Whether a nick is a configured admin, compared under IRC casemapping.
    pub fn is_admin(&self, nick: &str) -> bool {
        let nick = normalize(nick);
        self.admins.iter().any(|admin| normalize(admin) == nick)
    }
}

/// Monitoring policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelStatsConfig {
    /// Statically eligible channels.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Let admins add channels to the eligible list at runtime.
    #[serde(default)]
    pub allow_admin_add: bool,
    /// Whether eligible channels without an explicit override are monitored.
    #[serde(default)]
    pub default_enabled: bool,
    /// `.monitor on` for a non-eligible channel adds it first (when adding is allowed).
    #[serde(default = "default_true")]
    pub auto_add_on_enable: bool,
    /// Entries in each of the top and bottom rankings (default: 10).
    #[serde(default = "default_ranking_limit")]
    pub ranking_limit: u32,
}

impl Default for ChannelStatsConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            allow_admin_add: false,
            default_enabled: false,
            auto_add_on_enable: default_true(),
            ranking_limit: default_ranking_limit(),
        }
    }
}

impl ChannelStatsConfig {
    /// Configured channels, trimmed and lowercased. Blank entries are skipped.
    pub fn normalized_channels(&self) -> Vec<String> {
        self.channels
            .iter()
            .map(|c| normalize(c))
            .filter(|c| !c.is_empty())
            .collect()
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file. Relative paths resolve next to the config file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl DatabaseConfig {
    /// Resolve the database path against the directory holding the config file.
    pub fn resolve(&self, config_path: &Path) -> PathBuf {
        let path = Path::new(&self.path);
        if self.path == ":memory:" || path.is_absolute() {
            return path.to_path_buf();
        }

        match config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_realname() -> String {
    "Channel stats bot".to_string()
}

fn default_command_prefix() -> String {
    ".".to_string()
}

fn default_reconnect_delay() -> u64 {
    30
}

fn default_ranking_limit() -> u32 {
    10
}

fn default_db_path() -> String {
    "monitor.db".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> &'static str {
        r#"
[irc]
server = "irc.example.net:6667"
nick = "statsbot"
"#
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config: Config = toml::from_str(minimal()).unwrap();

        assert_eq!(config.irc.username(), "statsbot");
        assert_eq!(config.irc.command_prefix, ".");
        assert_eq!(config.irc.reconnect_delay_secs, 30);
        assert!(config.irc.admins.is_empty());

        assert!(config.channelstats.channels.is_empty());
        assert!(!config.channelstats.allow_admin_add);
        assert!(!config.channelstats.default_enabled);
        assert!(config.channelstats.auto_add_on_enable);
        assert_eq!(config.channelstats.ranking_limit, 10);

        assert_eq!(config.database.path, "monitor.db");
    }

    #[test]
    fn full_config_parses() {
        let config: Config = toml::from_str(
            r##"
[irc]
server = "irc.example.net:6697"
nick = "statsbot"
username = "stats"
realname = "Stats"
channels = ["#lounge"]
admins = ["Alice", "[ops]"]
command_prefix = "!"
reconnect_delay_secs = 5

[channelstats]
channels = [" #Rust ", "#go", ""]
allow_admin_add = true
default_enabled = true
auto_add_on_enable = false
ranking_limit = 3

[database]
path = "/var/lib/chanstats/monitor.db"
"##,
        )
        .unwrap();

        assert_eq!(config.irc.username(), "stats");
        assert_eq!(config.irc.command_prefix, "!");
        assert!(config.irc.is_admin("alice"));
        assert!(config.irc.is_admin("ALICE"));
        assert!(!config.irc.is_admin("mallory"));
        assert!(config.irc.is_admin("{OPS}"));

        assert_eq!(
            config.channelstats.normalized_channels(),
            vec!["#rust".to_string(), "#go".to_string()]
        );
        assert!(config.channelstats.allow_admin_add);
        assert!(config.channelstats.default_enabled);
        assert!(!config.channelstats.auto_add_on_enable);
        assert_eq!(config.channelstats.ranking_limit, 3);
    }

    #[test]
    fn missing_irc_section_is_an_error() {
        let result: Result<Config, _> = toml::from_str("[channelstats]\nchannels = []\n");
        assert!(result.is_err());
    }

    #[test]
    fn relative_db_path_resolves_next_to_config() {
        let db = DatabaseConfig {
            path: "monitor.db".to_string(),
        };
        assert_eq!(
            db.resolve(Path::new("/etc/chanstats/config.toml")),
            PathBuf::from("/etc/chanstats/monitor.db")
        );
        assert_eq!(
            db.resolve(Path::new("config.toml")),
            PathBuf::from("monitor.db")
        );
    }

    #[test]
    fn absolute_and_memory_paths_are_untouched() {
        let abs = DatabaseConfig {
            path: "/data/monitor.db".to_string(),
        };
        assert_eq!(
            abs.resolve(Path::new("/etc/chanstats/config.toml")),
            PathBuf::from("/data/monitor.db")
        );

        let mem = DatabaseConfig {
            path: ":memory:".to_string(),
        };
        assert_eq!(
            mem.resolve(Path::new("/etc/chanstats/config.toml")),
            PathBuf::from(":memory:")
        );
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, minimal()).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.irc.nick, "statsbot");

        let missing = Config::load(dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
