//! TLS probe: "does a TLS handshake succeed here at all", with certificate
//! validation deliberately disabled. This mirrors the Python original's
//! `ssl_context.verify_mode = ssl.CERT_NONE`. The probe establishes
//! nothing about trust, only about whether the peer speaks TLS.

use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

/// Accepts every certificate chain and every signature. Used only to probe
/// whether a TLS handshake completes, never to establish trust.
#[derive(Debug)]
struct AcceptAllCertVerifier;

impl ServerCertVerifier for AcceptAllCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

fn insecure_client_config() -> ClientConfig {
    ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAllCertVerifier))
        .with_no_client_auth()
}

/// Open a fresh TCP stream to `host:port` and attempt a TLS handshake with
/// certificate verification disabled. Returns `true` only if the handshake
/// itself completes within `time_limit`.
pub async fn probe(host: &str, port: u16, time_limit: Duration) -> bool {
    let attempt = async {
        let stream = TcpStream::connect((host, port)).await.ok()?;
        let connector = TlsConnector::from(Arc::new(insecure_client_config()));
        let server_name = ServerName::try_from(host.to_owned()).ok()?;
        connector.connect(server_name, stream).await.ok()
    };

    matches!(tokio::time::timeout(time_limit, attempt).await, Ok(Some(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn probe_fails_fast_against_a_plaintext_echo_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let ok = probe(&addr.ip().to_string(), addr.port(), Duration::from_millis(500)).await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn probe_fails_against_nothing_listening() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let ok = probe(&addr.ip().to_string(), addr.port(), Duration::from_millis(200)).await;
        assert!(!ok);
    }
}
