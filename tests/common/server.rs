//! Fake IRC server and bot process management.

use futures_util::{SinkExt, StreamExt};
use irc_proto::Message;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec};

const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// One accepted bot connection, driven line by line from the test.
pub struct FakeIrcServer {
    listener: TcpListener,
    conn: Option<Framed<TcpStream, LinesCodec>>,
}

impl FakeIrcServer {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self {
            listener,
            conn: None,
        })
    }

    pub fn address(&self) -> anyhow::Result<String> {
        Ok(self.listener.local_addr()?.to_string())
    }

    /// Wait for the bot to connect.
    pub async fn accept(&mut self) -> anyhow::Result<()> {
        let (stream, _) = timeout(RECV_TIMEOUT, self.listener.accept()).await??;
        self.conn = Some(Framed::new(stream, LinesCodec::new()));
        Ok(())
    }

    fn conn(&mut self) -> anyhow::Result<&mut Framed<TcpStream, LinesCodec>> {
        self.conn
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("no bot connected"))
    }

    pub async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.conn()?.send(line.to_string()).await?;
        Ok(())
    }

    /// Read messages until one satisfies `pred`, returning it.
    pub async fn recv_until<F>(&mut self, pred: F) -> anyhow::Result<Message>
    where
        F: Fn(&Message) -> bool,
    {
        let conn = self.conn()?;
        loop {
            let line = match timeout(RECV_TIMEOUT, conn.next()).await? {
                Some(line) => line?,
                None => anyhow::bail!("bot closed the connection"),
            };
            let msg: Message = line.parse()?;
            if pred(&msg) {
                return Ok(msg);
            }
        }
    }
}

/// A running `chanstatsd` process with its own config and database.
pub struct TestBot {
    child: Child,
    _dir: TempDir,
}

impl TestBot {
    /// Write a config pointing at `server` plus `extra` TOML, then start the bot.
    pub fn spawn(server: &str, extra: &str) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let config_path = write_config(dir.path(), server, extra)?;

        let child = Command::new(env!("CARGO_BIN_EXE_chanstatsd"))
            .arg(&config_path)
            .env("RUST_LOG", "debug")
            .spawn()?;

        Ok(Self { child, _dir: dir })
    }
}

impl Drop for TestBot {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Minimal config: admin `root`, database next to the config file.
pub fn write_config(dir: &Path, server: &str, extra: &str) -> anyhow::Result<PathBuf> {
    let config_path = dir.join("config.toml");
    let content = format!(
        r#"
[irc]
server = "{server}"
nick = "statsbot"
admins = ["root"]
reconnect_delay_secs = 1

[database]
path = "stats.db"

{extra}
"#
    );
    std::fs::write(&config_path, content)?;
    Ok(config_path)
}
