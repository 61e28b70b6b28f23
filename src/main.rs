//! chanstatsd - per-channel message activity counter for IRC.
//!
//! Counts messages per (channel, nick) in channels that are both eligible and
//! enabled, and answers ranking queries from the counters.

mod bot;
mod config;
mod db;
mod error;
mod monitor;

use crate::bot::Disconnect;
use crate::config::Config;
use crate::db::Database;
use crate::monitor::{Clock, Monitor, SystemClock};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {}", errors.len(), config_path);
    }

    info!(
        server = %config.irc.server,
        nick = %config.irc.nick,
        configured = config.channelstats.channels.len(),
        allow_admin_add = config.channelstats.allow_admin_add,
        default_enabled = config.channelstats.default_enabled,
        "Starting chanstatsd"
    );

    // Initialize database
    let db_path = config.database.resolve(Path::new(&config_path));
    let db = Database::new(&db_path.to_string_lossy()).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let monitor = Monitor::new(db.clone(), &config.channelstats, clock.clone());

    match monitor.admin.list().await {
        Ok(enabled) => info!(count = enabled.len(), channels = ?enabled, "Monitoring enabled"),
        Err(e) => warn!(error = %e, "Failed to read monitoring state"),
    }

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            let _ = shutdown_tx.send(());
        }
    });

    let irc_config = Arc::new(config.irc);
    let reconnect_delay = Duration::from_secs(irc_config.reconnect_delay_secs);

    loop {
        match bot::run(
            Arc::clone(&irc_config),
            monitor.clone(),
            Arc::clone(&clock),
            &mut shutdown_rx,
        )
        .await
        {
            Ok(Disconnect::Shutdown) => break,
            Ok(Disconnect::Closed) => warn!("Connection closed by server"),
            Err(e) => error!(error = %e, "Connection failed"),
        }

        info!(delay_secs = reconnect_delay.as_secs(), "Reconnecting after delay");
        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {}
            _ = shutdown_rx.recv() => break,
        }
    }

    db.close().await;
    info!("Stopped");
    Ok(())
}
