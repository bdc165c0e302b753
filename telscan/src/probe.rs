//! Bare TCP reachability probing (C4), no protocol classification.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::error::ConnectError;

/// Outcome of a single `try_connect` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionResult {
    pub host: String,
    pub port: u16,
    pub success: bool,
    pub time_ms: f64,
    pub error: Option<ConnectError>,
}

impl ConnectionResult {
    fn ok(host: &str, port: u16, elapsed: Duration) -> Self {
        Self {
            host: host.to_owned(),
            port,
            success: true,
            time_ms: round2(elapsed.as_secs_f64() * 1000.0),
            error: None,
        }
    }

    fn fail(host: &str, port: u16, elapsed: Duration, error: ConnectError) -> Self {
        Self {
            host: host.to_owned(),
            port,
            success: false,
            time_ms: round2(elapsed.as_secs_f64() * 1000.0),
            error: Some(error),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Open a TCP stream to `host:port` within `time_limit`, closing it
/// immediately on success. Errors are classified via [`ConnectError`]:
/// pure deadline expiry is `Timeout`; DNS resolution failure is `Dns`; any
/// other OS/network error is `Network`, carrying the verbatim message.
pub async fn try_connect(host: &str, port: u16, time_limit: Duration) -> ConnectionResult {
    let start = Instant::now();
    let addr = format!("{host}:{port}");

    match tokio::time::timeout(time_limit, TcpStream::connect(&addr)).await {
        Ok(Ok(_stream)) => ConnectionResult::ok(host, port, start.elapsed()),
        Ok(Err(e)) => ConnectionResult::fail(host, port, start.elapsed(), ConnectError::from_io(&e)),
        Err(_) => ConnectionResult::fail(host, port, start.elapsed(), ConnectError::Timeout),
    }
}
