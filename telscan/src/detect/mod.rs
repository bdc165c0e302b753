//! Passive + active TCP protocol detection (C5).

pub mod handoff;
pub mod tls;

use std::collections::HashMap;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::DetectError;
use crate::telnet::TelnetClient;
use handoff::{connect_ssh, http_session, HandoffClient, HandoffError};

const PASSIVE_READ_TIMEOUT: Duration = Duration::from_secs(1);
const HTTP_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// The protocol tag a `detect()` call settles on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Ssh,
    Ftp,
    Telnet,
    Https,
    Http,
    UnknownBanner,
    Unknown,
    Error,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Ssh => "SSH",
            Protocol::Ftp => "FTP",
            Protocol::Telnet => "TELNET",
            Protocol::Https => "HTTPS",
            Protocol::Http => "HTTP",
            Protocol::UnknownBanner => "UNKNOWN_BANNER",
            Protocol::Unknown => "UNKNOWN",
            Protocol::Error => "ERROR",
        }
    }
}

/// The outcome of a `detect()` call. Never represents a raised exception;
/// failures are folded into [`Protocol::Error`] with the message in `extra`.
///
/// `banner` is present exactly when classification came from passive
/// inspection of non-empty server-initiated data: the raw bytes read, up to
/// 1024 of them, untrimmed. It is a separate field from `extra` because it
/// is raw wire data, not a derived fact like `extra`'s `"version"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionResult {
    pub protocol: Protocol,
    pub banner: Option<Vec<u8>>,
    pub extra: HashMap<String, String>,
}

impl DetectionResult {
    fn new(protocol: Protocol) -> Self {
        Self { protocol, banner: None, extra: HashMap::new() }
    }

    fn with(protocol: Protocol, extra: impl IntoIterator<Item = (&'static str, String)>) -> Self {
        Self {
            protocol,
            banner: None,
            extra: extra.into_iter().map(|(k, v)| (k.to_owned(), v)).collect(),
        }
    }

    /// Attach the raw, untrimmed banner bytes read during passive
    /// inspection.
    fn with_banner(mut self, raw: Vec<u8>) -> Self {
        self.banner = Some(raw);
        self
    }

    fn error(message: impl Into<String>) -> Self {
        Self::with(Protocol::Error, [("error", message.into())])
    }
}

/// Probes a single host/port pair. A detector instance is single-use per
/// `detect()` call. It never shares a mutable connection across two
/// concurrent calls.
pub struct ProtocolDetector {
    timeout: Duration,
}

impl Default for ProtocolDetector {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

impl ProtocolDetector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run the passive-then-active decision procedure. Always returns a
    /// result. Classification failures surface as `Protocol::Error`, never
    /// as a propagated error.
    pub async fn detect(&self, host: &str, port: u16) -> DetectionResult {
        match self.passive_detection(host, port).await {
            Ok(Outcome::Classified(result)) => result,
            Ok(Outcome::Unknown) => self.active_detection(host, port).await,
            Err(e) => DetectionResult::error(e.to_string()),
        }
    }

    /// Run only the passive phase: one read of the opening banner, no TLS
    /// or HTTP probing on fallthrough. Used by the CLI's `banner` mode.
    pub async fn detect_passive_only(&self, host: &str, port: u16) -> DetectionResult {
        match self.passive_detection(host, port).await {
            Ok(Outcome::Classified(result)) => result,
            Ok(Outcome::Unknown) => DetectionResult::new(Protocol::Unknown),
            Err(e) => DetectionResult::error(e.to_string()),
        }
    }

    async fn passive_detection(&self, host: &str, port: u16) -> Result<Outcome, DetectError> {
        let mut stream = TcpStream::connect((host, port)).await?;
        let mut buf = [0u8; 1024];

        let n = match tokio::time::timeout(PASSIVE_READ_TIMEOUT, stream.read(&mut buf)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                debug!("passive read timed out for {host}:{port}, falling through to active probing");
                return Ok(Outcome::Unknown);
            }
        };

        stream.shutdown().await.ok();

        if n == 0 {
            return Ok(Outcome::Unknown);
        }
        let banner = buf[..n].to_vec();

        if banner.starts_with(b"SSH-") {
            let version = String::from_utf8_lossy(&banner).trim().to_owned();
            return Ok(Outcome::Classified(
                DetectionResult::with(Protocol::Ssh, [("version", version)]).with_banner(banner),
            ));
        }
        if banner.starts_with(b"220 ") {
            return Ok(Outcome::Classified(DetectionResult::new(Protocol::Ftp).with_banner(banner)));
        }
        if banner.contains(&0xFFu8) {
            return Ok(Outcome::Classified(DetectionResult::new(Protocol::Telnet).with_banner(banner)));
        }
        Ok(Outcome::Classified(DetectionResult::new(Protocol::UnknownBanner).with_banner(banner)))
    }

    /// Only reached when the passive phase timed out with no bytes at all.
    async fn active_detection(&self, host: &str, port: u16) -> DetectionResult {
        if tls::probe(host, port, self.timeout).await {
            return DetectionResult::new(Protocol::Https);
        }

        match self.http_probe(host, port).await {
            Ok(Some(version)) => DetectionResult::with(Protocol::Http, [("version", version)]),
            Ok(None) => DetectionResult::new(Protocol::Unknown),
            Err(e) => DetectionResult::error(e.to_string()),
        }
    }

    async fn http_probe(&self, host: &str, port: u16) -> Result<Option<String>, DetectError> {
        let mut stream = TcpStream::connect((host, port)).await?;
        let request = format!("HEAD / HTTP/1.1\r\nHost: {host}\r\n\r\n");
        stream.write_all(request.as_bytes()).await?;

        let mut buf = [0u8; 1024];
        let n = match tokio::time::timeout(HTTP_PROBE_TIMEOUT, stream.read(&mut buf)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Ok(None),
        };
        stream.shutdown().await.ok();

        let text = String::from_utf8_lossy(&buf[..n]);
        if !text.contains("HTTP/") {
            return Ok(None);
        }
        let version = if text.contains("HTTP/1.0") {
            "1.0"
        } else if text.contains("HTTP/2") {
            "2"
        } else {
            "1.1"
        };
        Ok(Some(version.to_owned()))
    }
}

enum Outcome {
    Classified(DetectionResult),
    Unknown,
}

/// Return a ready, protocol-specific client for `result`, or
/// `HandoffError::Unavailable` for tags with no client (`UNKNOWN_BANNER`,
/// `UNKNOWN`, `ERROR`).
pub async fn get_client(result: &DetectionResult, host: &str, port: u16) -> Result<HandoffClient, HandoffError> {
    match result.protocol {
        Protocol::Ssh => Ok(HandoffClient::Ssh(connect_ssh(host, port).await?)),
        Protocol::Http => Ok(HandoffClient::Http(http_session("http", host, port)?)),
        Protocol::Https => Ok(HandoffClient::Http(http_session("https", host, port)?)),
        Protocol::Telnet => {
            let mut client = TelnetClient::new(host, port);
            client.connect().await?;
            Ok(HandoffClient::Telnet(client))
        }
        _ => Err(HandoffError::Unavailable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn spawn_banner(banner: &'static [u8]) -> (String, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut sock, _)) = listener.accept().await {
                let _ = sock.write_all(banner).await;
            }
        });
        (addr.ip().to_string(), addr.port())
    }

    #[tokio::test]
    async fn ssh_banner_is_classified_with_version() {
        let (host, port) = spawn_banner(b"SSH-2.0-OpenSSH_9.6\r\n").await;
        let result = ProtocolDetector::default().detect(&host, port).await;
        assert_eq!(result.protocol, Protocol::Ssh);
        assert_eq!(result.extra.get("version").map(String::as_str), Some("SSH-2.0-OpenSSH_9.6"));
        assert_eq!(result.banner.as_deref(), Some(b"SSH-2.0-OpenSSH_9.6\r\n".as_ref()));
    }

    #[tokio::test]
    async fn ftp_banner_is_classified() {
        let (host, port) = spawn_banner(b"220 Welcome to FTP\r\n").await;
        let result = ProtocolDetector::default().detect(&host, port).await;
        assert_eq!(result.protocol, Protocol::Ftp);
        assert_eq!(result.banner.as_deref(), Some(b"220 Welcome to FTP\r\n".as_ref()));
    }

    #[tokio::test]
    async fn telnet_banner_with_iac_is_classified() {
        let (host, port) = spawn_banner(&[0xFF, 0xFD, 0x01]).await;
        let result = ProtocolDetector::default().detect(&host, port).await;
        assert_eq!(result.protocol, Protocol::Telnet);
        // Passive Telnet classification must still carry the raw banner
        // bytes, exactly like the SSH/FTP/UNKNOWN_BANNER branches do.
        assert_eq!(result.banner.as_deref(), Some([0xFF, 0xFD, 0x01].as_ref()));
    }

    #[tokio::test]
    async fn unrecognised_non_empty_banner_is_unknown_banner() {
        let (host, port) = spawn_banner(b"hello there\r\n").await;
        let result = ProtocolDetector::default().detect(&host, port).await;
        assert_eq!(result.protocol, Protocol::UnknownBanner);
        // Banner is the raw, untrimmed bytes read off the wire, not a
        // trimmed fact in `extra`.
        assert_eq!(result.banner.as_deref(), Some(b"hello there\r\n".as_ref()));
    }

    #[tokio::test]
    async fn connection_failure_is_reported_as_error_not_panic() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = ProtocolDetector::new(Duration::from_millis(200)).detect(&addr.ip().to_string(), addr.port()).await;
        assert_eq!(result.protocol, Protocol::Error);
        assert!(result.extra.contains_key("error"));
    }

    #[tokio::test]
    async fn http_head_response_is_classified_with_version() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // First connection (the passive probe) gets silence until it times
            // out. Every later connection (TLS probe, HTTP probe) gets an HTTP
            // response. The TLS probe fails its handshake against plain bytes
            // exactly as it should.
            let mut first = true;
            while let Ok((mut sock, _)) = listener.accept().await {
                if first {
                    first = false;
                    tokio::time::sleep(PASSIVE_READ_TIMEOUT + Duration::from_millis(50)).await;
                    continue;
                }
                let mut buf = [0u8; 256];
                let _ = sock.read(&mut buf).await;
                let _ = sock.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").await;
            }
        });

        let result = ProtocolDetector::new(Duration::from_millis(300)).detect(&addr.ip().to_string(), addr.port()).await;
        assert_eq!(result.protocol, Protocol::Http);
        assert_eq!(result.extra.get("version").map(String::as_str), Some("1.1"));
    }
}
