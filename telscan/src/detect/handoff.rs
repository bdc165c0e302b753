//! Protocol-specific handoff clients returned by `get_client`.

use std::sync::Arc;

use reqwest::Url;
use russh::client::{self, Handle};
use russh_keys::PublicKey;
use thiserror::Error;

use crate::telnet::{ClientError, TelnetClient};

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("SSH connection failed: {0}")]
    Ssh(String),
    #[error("HTTP client build failed: {0}")]
    Http(String),
    #[error("telnet handoff failed: {0}")]
    Telnet(#[from] ClientError),
    #[error("no client available for this protocol")]
    Unavailable,
}

/// `russh::client::Handler` that accepts every server key. There is no
/// known-hosts store to consult and no credentials are supplied by this
/// crate, matching the original's `known_hosts=None` handoff.
#[derive(Debug, Default)]
pub struct AcceptAllServerKeys;

impl client::Handler for AcceptAllServerKeys {
    type Error = russh::Error;

    async fn check_server_key(&mut self, _server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// An HTTP(S) session bound to a fixed `scheme://host:port` base, since
/// `reqwest::Client` has no native concept of a base URL.
pub struct HttpSession {
    client: reqwest::Client,
    base: Url,
}

impl HttpSession {
    pub fn new(base: Url) -> Result<Self, HandoffError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| HandoffError::Http(e.to_string()))?;
        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Join `path` onto the session's base URL and start a GET request.
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let url = self.base.join(path).unwrap_or_else(|_| self.base.clone());
        self.client.get(url)
    }
}

/// The ready, protocol-specific client `get_client` hands back.
pub enum HandoffClient {
    Ssh(Handle<AcceptAllServerKeys>),
    Http(HttpSession),
    Telnet(TelnetClient),
}

/// Connect an SSH handle with no known-hosts enforcement and no
/// credentials. Authentication, if any, is the caller's responsibility.
pub async fn connect_ssh(host: &str, port: u16) -> Result<Handle<AcceptAllServerKeys>, HandoffError> {
    let addr = format!("{host}:{port}");
    let config = Arc::new(client::Config::default());
    client::connect(config, &addr, AcceptAllServerKeys)
        .await
        .map_err(|e| HandoffError::Ssh(e.to_string()))
}

pub fn http_session(scheme: &str, host: &str, port: u16) -> Result<HttpSession, HandoffError> {
    let base = Url::parse(&format!("{scheme}://{host}:{port}")).map_err(|e| HandoffError::Http(e.to_string()))?;
    HttpSession::new(base)
}
