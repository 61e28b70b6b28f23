//! IRC client connection loop.
//!
//! One TCP connection framed with `LinesCodec`; each line is parsed into an
//! `irc_proto::Message` and replies are built as `Command`s. [`Session`] holds
//! all per-connection state, so it can be driven without a socket in tests.

use super::commands::{BotCommand, Origin, Request, dispatch};
use crate::config::IrcConfig;
use crate::monitor::{Clock, MessageEvent, Monitor, is_valid_channel, normalize};
use futures_util::{SinkExt, StreamExt};
use irc_proto::{Command, Message, Response};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

/// Tags (8191) plus a classic 512-byte message.
const MAX_LINE_LEN: usize = 8191 + 512;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection-level errors.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] LinesCodecError),
    #[error("connect to {0} timed out")]
    ConnectTimeout(String),
    #[error("server closed the link: {0}")]
    ServerError(String),
}

/// Why a connection ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// The server closed the socket.
    Closed,
    /// Shutdown was requested; QUIT was sent if the link was up.
    Shutdown,
}

/// Per-connection state.
pub struct Session {
    config: Arc<IrcConfig>,
    monitor: Monitor,
    clock: Arc<dyn Clock>,
    current_nick: String,
    registered: bool,
    joined: HashSet<String>,
}

impl Session {
    pub fn new(config: Arc<IrcConfig>, monitor: Monitor, clock: Arc<dyn Clock>) -> Self {
        let current_nick = config.nick.clone();
        Self {
            config,
            monitor,
            clock,
            current_nick,
            registered: false,
            joined: HashSet::new(),
        }
    }

    /// Commands that open the connection.
    pub fn greeting(&self) -> Vec<Command> {
        vec![
            Command::NICK(self.current_nick.clone()),
            Command::USER(
                self.config.username().to_string(),
                "0".to_string(),
                self.config.realname.clone(),
            ),
        ]
    }

    pub fn current_nick(&self) -> &str {
        &self.current_nick
    }

    pub fn joined(&self) -> &HashSet<String> {
        &self.joined
    }

    fn is_self(&self, nick: &str) -> bool {
        normalize(nick) == normalize(&self.current_nick)
    }

    /// Process one incoming message, returning commands to send.
    pub async fn handle(&mut self, msg: &Message) -> Result<Vec<Command>, BotError> {
        let source = msg.source_nickname();

        let out = match &msg.command {
            Command::PING(token, _) => vec![Command::PONG(token.clone(), None)],
            Command::ERROR(reason) => return Err(BotError::ServerError(reason.clone())),
            Command::Response(Response::RPL_WELCOME, args) => {
                self.registered = true;
                if let Some(nick) = args.first() {
                    self.current_nick = nick.clone();
                }
                info!(nick = %self.current_nick, "Registered with server");
                self.autojoin().await
            }
            // Nick taken before registration: try again with a suffix
            Command::Response(Response::ERR_NICKNAMEINUSE, _) if !self.registered => {
                self.current_nick.push('_');
                warn!(nick = %self.current_nick, "Nickname in use, retrying");
                vec![Command::NICK(self.current_nick.clone())]
            }
            Command::NICK(new_nick) => {
                if source.is_some_and(|s| self.is_self(s)) {
                    self.current_nick = new_nick.clone();
                }
                Vec::new()
            }
            Command::JOIN(channel, _, _) => {
                if source.is_some_and(|s| self.is_self(s)) {
                    info!(channel = %channel, "Joined channel");
                    self.joined.insert(normalize(channel));
                }
                Vec::new()
            }
            Command::PART(channel, _) => {
                if source.is_some_and(|s| self.is_self(s)) {
                    self.joined.remove(&normalize(channel));
                }
                Vec::new()
            }
            Command::KICK(channel, target, _) => {
                if self.is_self(target) {
                    warn!(channel = %channel, "Kicked from channel");
                    self.joined.remove(&normalize(channel));
                }
                Vec::new()
            }
            Command::PRIVMSG(target, text) => match source {
                Some(nick) => self.privmsg(nick, target, text).await,
                None => Vec::new(),
            },
            _ => Vec::new(),
        };

        Ok(out)
    }

    /// JOINs for extra channels plus every eligible channel.
    async fn autojoin(&self) -> Vec<Command> {
        let mut channels: BTreeSet<String> =
            self.config.channels.iter().map(|c| normalize(c)).collect();

        match self.monitor.admin.eligible().await {
            Ok(eligible) => channels.extend(eligible),
            Err(e) => warn!(error = %e, "Failed to load eligible channels for autojoin"),
        }

        channels
            .into_iter()
            .filter(|c| is_valid_channel(c))
            .map(|c| Command::JOIN(c, None, None))
            .collect()
    }

    async fn privmsg(&self, nick: &str, target: &str, text: &str) -> Vec<Command> {
        let is_channel = target.starts_with(['#', '&']);
        if is_channel {
            let event = MessageEvent {
                channel: target.to_string(),
                user: nick.to_string(),
                timestamp: self.clock.now(),
                is_self: self.is_self(nick),
            };
            match self.monitor.aggregator.record_event(&event).await {
                Ok(outcome) => debug!(channel = %target, nick = %nick, ?outcome, "Message seen"),
                Err(e) => {
                    warn!(channel = %target, error = %e, code = e.error_code(), "Failed to record message")
                }
            }
        } else if !self.is_self(target) {
            return Vec::new();
        }

        let Some(command) = BotCommand::parse(&self.config.command_prefix, text) else {
            return Vec::new();
        };

        let request = Request {
            nick,
            origin: if is_channel {
                Origin::Channel(target)
            } else {
                Origin::Private
            },
            is_admin: self.config.is_admin(nick),
            joined: &self.joined,
        };

        dispatch(&self.monitor, &request, command)
            .await
            .into_iter()
            .map(|reply| Command::PRIVMSG(reply.target, reply.text))
            .collect()
    }
}

/// Render a command as one line without the CR/LF terminator; the codec adds it.
fn line(command: &Command) -> String {
    String::from(command)
}

/// Connect, register and serve until the link drops or shutdown is requested.
pub async fn run(
    config: Arc<IrcConfig>,
    monitor: Monitor,
    clock: Arc<dyn Clock>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> Result<Disconnect, BotError> {
    info!(server = %config.server, nick = %config.nick, "Connecting");
    let stream = tokio::select! {
        biased;
        _ = shutdown_rx.recv() => {
            info!("Shutdown requested while connecting");
            return Ok(Disconnect::Shutdown);
        }
        connected = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(config.server.as_str())) => {
            connected.map_err(|_| BotError::ConnectTimeout(config.server.clone()))??
        }
    };
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LEN));

    let mut session = Session::new(config, monitor, clock);
    for command in session.greeting() {
        framed.send(line(&command)).await?;
    }

    loop {
        tokio::select! {
            next = framed.next() => {
                let raw = match next {
                    Some(Ok(raw)) => raw,
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        warn!("Dropped overlong line from server");
                        continue;
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        info!(channels = session.joined().len(), "Server closed the connection");
                        return Ok(Disconnect::Closed);
                    }
                };

                let msg = match raw.parse::<Message>() {
                    Ok(msg) => msg,
                    Err(e) => {
                        debug!(error = %e, "Ignoring unparsable line");
                        continue;
                    }
                };
                for command in session.handle(&msg).await? {
                    framed.send(line(&command)).await?;
                }
            }
            _ = shutdown_rx.recv() => {
                info!(nick = %session.current_nick(), "Disconnecting");
                let quit = Command::QUIT(Some("Shutting down".to_string()));
                let _ = framed.send(line(&quit)).await;
                return Ok(Disconnect::Shutdown);
            }
        }
    }
}
