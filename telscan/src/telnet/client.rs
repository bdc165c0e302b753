//! Async Telnet client: connection lifecycle, IAC-aware read/write, and
//! pattern-based prompt matching on top of [`super::negotiator::Negotiator`].

use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::error::{ConnectError, PatternError};

use super::negotiator::{initial_negotiation, Negotiator};
use super::options::TerminalProfile;

/// `[>#$] $` as a regex: one of `>`, `#`, `$` then a literal space at end of
/// text. This is the bracket expression from the reference client's prompt
/// constant, interpreted as a pattern rather than a literal string.
pub const DEFAULT_PROMPT: &str = r"[>#$] $";

const NEGOTIATION_GRACE: Duration = Duration::from_millis(100);
const NEGOTIATION_READ_TIMEOUT: Duration = Duration::from_secs(1);
const READ_UNTIL_POLL_INTERVAL: Duration = Duration::from_millis(10);
const INITIAL_BUFFER_SIZE: usize = 4096;
const INTERACT_MAX_IDLE: u32 = 10;
const INTERACT_IDLE_STEP: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error("not connected")]
    NotConnected,
    #[error("read timed out")]
    ReadTimeout,
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A Telnet connection: TCP stream plus negotiation state.
///
/// Reconnectable: `close()` nulls both halves and a later `connect()`
/// opens a fresh stream, reusing the same negotiator and terminal profile.
pub struct TelnetClient {
    host: String,
    port: u16,
    connect_timeout: Duration,
    read_timeout: Duration,
    default_prompt: String,
    negotiator: Negotiator,
    reader: Option<BufReader<OwnedReadHalf>>,
    writer: Option<OwnedWriteHalf>,
}

impl TelnetClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_profile(host, port, TerminalProfile::default())
    }

    pub fn with_profile(host: impl Into<String>, port: u16, profile: TerminalProfile) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            default_prompt: DEFAULT_PROMPT.to_owned(),
            negotiator: Negotiator::new(profile),
            reader: None,
            writer: None,
        }
    }

    pub fn connect_timeout(mut self, d: Duration) -> Self {
        self.connect_timeout = d;
        self
    }

    pub fn read_timeout(mut self, d: Duration) -> Self {
        self.read_timeout = d;
        self
    }

    pub fn default_prompt(mut self, pattern: impl Into<String>) -> Self {
        self.default_prompt = pattern.into();
        self
    }

    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    /// Open the TCP stream, perform the opening negotiation flurry, and
    /// leave the client ready for `read`/`write`. A no-op if already
    /// connected.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if self.is_connected() {
            return Ok(());
        }

        let addr = (self.host.as_str(), self.port);
        let stream = match timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ClientError::Connect(ConnectError::from_io(&e))),
            Err(_) => return Err(ClientError::Connect(ConnectError::Timeout)),
        };

        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        write_half.write_all(&initial_negotiation()).await?;
        sleep(NEGOTIATION_GRACE).await;

        let mut buf = [0u8; 1024];
        match timeout(NEGOTIATION_READ_TIMEOUT, reader.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => {
                let (_, replies) = self.negotiator.handle_command(&buf[..n]);
                for reply in replies {
                    write_half.write_all(&reply).await?;
                }
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(ClientError::Io(e)),
            Err(_) => debug!("no opening negotiation flurry from {}:{}", self.host, self.port),
        }

        self.reader = Some(reader);
        self.writer = Some(write_half);
        info!("connected to {}:{}", self.host, self.port);
        Ok(())
    }

    /// Close the connection. Never fails; errors are logged and dropped.
    pub async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.shutdown().await {
                warn!("error closing telnet connection to {}:{}: {e}", self.host, self.port);
            }
        }
        self.reader = None;
    }

    /// Read up to `size` bytes with the given deadline (default:
    /// `read_timeout`), de-escaped and with negotiation replies already
    /// sent. An empty return on timeout is not an error.
    pub async fn read(&mut self, size: usize, time_limit: Option<Duration>) -> Result<Vec<u8>, ClientError> {
        let deadline = time_limit.unwrap_or(self.read_timeout);
        let mut buf = vec![0u8; size];

        let reader = self.reader.as_mut().ok_or(ClientError::NotConnected)?;
        let n = match timeout(deadline, reader.read(&mut buf)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(ClientError::Io(e)),
            Err(_) => return Ok(Vec::new()),
        };
        buf.truncate(n);

        let (data, replies) = self.negotiator.handle_command(&buf);
        if !replies.is_empty() {
            let writer = self.writer.as_mut().ok_or(ClientError::NotConnected)?;
            for reply in replies {
                writer.write_all(&reply).await?;
            }
        }
        Ok(data)
    }

    /// IAC-escape and write `bytes`. Takes a fast path when no `0xFF` byte
    /// is present.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        let writer = self.writer.as_mut().ok_or(ClientError::NotConnected)?;
        if !bytes.contains(&0xFF) {
            writer.write_all(bytes).await?;
            return Ok(());
        }

        let mut escaped = Vec::with_capacity(bytes.len() + 8);
        for &b in bytes {
            escaped.push(b);
            if b == 0xFF {
                escaped.push(0xFF);
            }
        }
        writer.write_all(&escaped).await?;
        Ok(())
    }

    /// Accumulate reads until the decoded buffer matches `pattern` (a
    /// regular expression) or `time_limit` elapses.
    pub async fn read_until(&mut self, pattern: &str, time_limit: Option<Duration>) -> Result<Vec<u8>, ClientError> {
        let re = Regex::new(pattern).map_err(PatternError)?;
        let deadline = time_limit.unwrap_or(self.read_timeout);
        let start = Instant::now();
        let mut buf: Vec<u8> = Vec::with_capacity(INITIAL_BUFFER_SIZE);
        let mut capacity = INITIAL_BUFFER_SIZE;

        loop {
            let elapsed = start.elapsed();
            if elapsed >= deadline {
                return Err(ClientError::ReadTimeout);
            }
            let remaining = deadline - elapsed;
            let per_read = remaining.min(Duration::from_secs(1));

            let chunk = self.read(capacity, Some(per_read)).await?;
            if chunk.is_empty() {
                sleep(READ_UNTIL_POLL_INTERVAL).await;
                continue;
            }
            buf.extend_from_slice(&chunk);

            let text = String::from_utf8_lossy(&buf);
            if re.is_match(&text) {
                return Ok(buf);
            }
            if buf.len() >= capacity {
                capacity *= 2;
            }
        }
    }

    pub async fn read_until_prompt(&mut self, prompt: Option<&str>, time_limit: Option<Duration>) -> Result<Vec<u8>, ClientError> {
        let pattern = prompt.unwrap_or(&self.default_prompt).to_owned();
        self.read_until(&pattern, time_limit).await
    }

    pub async fn send_command(&mut self, text: &str, newline: &str) -> Result<(), ClientError> {
        let mut line = String::with_capacity(text.len() + newline.len());
        line.push_str(text);
        line.push_str(newline);
        self.write(line.as_bytes()).await
    }

    /// Bridge stdin to the connection and stream received bytes to the log
    /// until cancelled. The reader backs off with an idle counter clamped
    /// at 10, sleeping `50ms * idle_count` between empty reads.
    pub async fn interact(&mut self) -> Result<(), ClientError> {
        let mut stdin = BufReader::new(tokio::io::stdin());
        let mut idle_count: u32 = 0;

        loop {
            tokio::select! {
                line = read_stdin_line(&mut stdin) => {
                    match line {
                        Some(text) => self.send_command(&text, "\r\n").await?,
                        None => return Ok(()),
                    }
                }
                chunk = self.read(1024, Some(Duration::from_millis(100))) => {
                    let chunk = chunk?;
                    if chunk.is_empty() {
                        idle_count = (idle_count + 1).min(INTERACT_MAX_IDLE);
                        sleep(INTERACT_IDLE_STEP * idle_count).await;
                    } else {
                        idle_count = 0;
                        info!(target: "telscan::telnet::interact", "{}", String::from_utf8_lossy(&chunk));
                    }
                }
            }
        }
    }
}

async fn read_stdin_line(stdin: &mut BufReader<tokio::io::Stdin>) -> Option<String> {
    use tokio::io::AsyncBufReadExt;
    let mut line = String::new();
    match stdin.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_owned()),
        Err(_) => None,
    }
}

/// Construct, connect-or-fail, and return a ready client.
pub async fn connect_to(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Result<TelnetClient, ClientError> {
    let mut client = TelnetClient::new(host, port).connect_timeout(connect_timeout);
    client.connect().await?;
    Ok(client)
}

/// Scoped-resource wrapper: construction connects, and [`TelnetClientGuard::close`]
/// performs the async teardown. `Drop` is a best-effort fallback only: it
/// cannot `await`, so it spawns the close onto the current runtime if one is
/// running and otherwise does nothing, relying on the OS to reclaim the
/// socket. Callers that need a guaranteed clean shutdown should call
/// `close()` explicitly rather than letting the guard drop.
pub struct TelnetClientGuard {
    client: Option<TelnetClient>,
}

impl TelnetClientGuard {
    pub async fn connect(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Result<Self, ClientError> {
        let client = connect_to(host, port, connect_timeout).await?;
        Ok(Self { client: Some(client) })
    }

    pub fn get_mut(&mut self) -> &mut TelnetClient {
        self.client.as_mut().expect("TelnetClientGuard used after close")
    }

    pub async fn close(mut self) {
        if let Some(mut client) = self.client.take() {
            client.close().await;
        }
    }
}

impl Drop for TelnetClientGuard {
    fn drop(&mut self) {
        if let Some(mut client) = self.client.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    client.close().await;
                });
            }
        }
    }
}
