//! Negotiated session parameters

use super::cert::{peer_chain, CertInfo};
use openssl::ssl::{NameType, SslRef};

/// Snapshot of what a completed handshake negotiated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    /// Protocol version, e.g. `TLSv1.2`
    pub version: String,
    pub cipher: Option<String>,
    /// SNI name sent by the client
    pub servername: Option<String>,
    pub alpn: Option<String>,
    /// Server chain, leaf first; empty for certificate-less PSK suites
    pub cert_chain: Vec<CertInfo>,
    pub session_reused: bool,
}

impl SessionInfo {
    pub fn from_ssl(ssl: &SslRef) -> Self {
        SessionInfo {
            version: ssl.version_str().to_string(),
            cipher: ssl.current_cipher().map(|c| c.name().to_string()),
            servername: ssl.servername(NameType::HOST_NAME).map(|s| s.to_string()),
            alpn: ssl
                .selected_alpn_protocol()
                .map(|p| String::from_utf8_lossy(p).into_owned()),
            cert_chain: peer_chain(ssl),
            session_reused: ssl.session_reused(),
        }
    }

    /// The server's leaf certificate, if it sent one
    pub fn peer(&self) -> Option<&CertInfo> {
        self.cert_chain.first()
    }
}
