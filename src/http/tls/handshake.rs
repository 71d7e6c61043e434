//! Handshake hook
//!
//! The adapter calls a `Handshake` implementation exactly once for every new
//! secure session, after the socket is connected and before any HTTP bytes
//! are written. If the hook returns an error the session is discarded.

use super::config::{HandshakeSettings, TlsError};
use super::credentials::{CertificateCredential, Fingerprint, PasswordCredential};

/// Parameters of one client handshake
///
/// Built fresh for every handshake; borrowed from the immutable credential
/// set so nothing from a previous connection can leak into it.
#[derive(Debug, Clone, Copy)]
pub struct HandshakeRequest<'a> {
    /// Password credential for password-based mutual authentication
    pub password: Option<&'a PasswordCredential>,
    /// Client certificate and key
    pub certificate: Option<&'a CertificateCredential>,
    /// Pin the server's leaf certificate must match
    pub fingerprint: Option<&'a Fingerprint>,
    /// Protocol preferences, passed through untouched
    pub settings: &'a HandshakeSettings,
    /// Host the connection was made to, used for SNI unless overridden
    pub server_name: &'a str,
}

impl<'a> HandshakeRequest<'a> {
    /// Name to send as SNI, if any
    ///
    /// IP literals are not valid SNI names and are skipped.
    pub fn sni(&self) -> Option<&'a str> {
        let name = self.settings.servername.as_deref().unwrap_or(self.server_name);
        if name.is_empty() || name.parse::<std::net::IpAddr>().is_ok() {
            None
        } else {
            Some(name)
        }
    }
}

/// Hook run on each freshly wrapped session
pub trait Handshake<S: ?Sized> {
    fn handshake(&self, session: &mut S) -> Result<(), TlsError>;
}

impl<S: ?Sized, F> Handshake<S> for F
where
    F: Fn(&mut S) -> Result<(), TlsError>,
{
    fn handshake(&self, session: &mut S) -> Result<(), TlsError> {
        self(session)
    }
}
