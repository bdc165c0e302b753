//! Shared error taxonomy types referenced across the connect, pattern, and
//! detection boundaries (C9). Kept separate from `telnet`/`probe`/`detect`
//! since `ConnectError` in particular is produced by both C3 and C4.

use thiserror::Error;

/// Classified outcome of a failed TCP connect attempt. Carries a stable
/// category (`kind()`) alongside the original OS/library message, so a
/// caller can branch on the category without string-matching the text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("Connection timed out")]
    Timeout,
    #[error("DNS resolution error: {0}")]
    Dns(String),
    #[error("{0}")]
    Network(String),
    #[error("unexpected: {0}")]
    Other(String),
}

impl ConnectError {
    /// The stable category name: "timeout" / "dns" / "network" / "other".
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectError::Timeout => "timeout",
            ConnectError::Dns(_) => "dns",
            ConnectError::Network(_) => "network",
            ConnectError::Other(_) => "other",
        }
    }

    /// Classify an I/O error from a completed (non-timeout) connect
    /// attempt as DNS resolution failure or generic network/OS error.
    pub fn from_io(e: &std::io::Error) -> Self {
        if is_dns_error(e) {
            ConnectError::Dns(e.to_string())
        } else {
            ConnectError::Network(e.to_string())
        }
    }
}

/// `TcpStream::connect` resolves the address itself; a resolution failure
/// surfaces as `io::ErrorKind::NotFound` (no such host) or `Other` wrapping
/// a `getaddrinfo` failure, distinct from the connection-refused/reset
/// errors a reachable-but-closed port produces.
fn is_dns_error(e: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(e.kind(), ErrorKind::NotFound) || e.raw_os_error().is_none() && e.to_string().contains("resolve")
}

/// A malformed `read_until`/`read_until_prompt` pattern.
#[derive(Debug, Error)]
#[error("invalid pattern: {0}")]
pub struct PatternError(#[from] pub regex::Error);

/// The catch-all error internal to `ProtocolDetector`, collapsed into
/// `DetectionResult::Error` at the `detect()` boundary — `detect()` itself
/// never returns `Err`.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
