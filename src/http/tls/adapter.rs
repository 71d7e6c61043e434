//! Secure-transport adapter
//!
//! `TlsTransport` is the `Transport` an `HttpConnection` uses to get a secure
//! session instead of a raw socket. Each `open()`:
//!
//! 1. dials a brand-new stream through the `Dialer`
//! 2. wraps it in a brand-new session through the `SessionFactory`
//! 3. runs the `Handshake` hook on that session, once
//!
//! and hands the session to the HTTP layer only if all three succeed. On a
//! hook failure the session is closed before the error is returned, so the
//! adapter never keeps a half-open connection alive.

use super::auth::Authenticator;
use super::config::{HandshakeSettings, TlsError};
use super::credentials::{CertificateChain, CredentialSet, PrivateKey};
use super::handshake::Handshake;
use super::session::{OpenSslFactory, SessionFactory};
use crate::http::{HttpConnection, Result, SessionOps, Transport};
use crate::net::{Dialer, Target, TcpDialer, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HTTPS_PORT};
use std::time::Duration;

/// Transport yielding handshaken secure sessions
#[derive(Debug, Clone)]
pub struct TlsTransport<H, D = TcpDialer, F = OpenSslFactory> {
    target: Target,
    hook: H,
    dialer: D,
    factory: F,
}

impl<H> TlsTransport<H> {
    /// OpenSSL sessions over plain TCP
    pub fn new(target: Target, hook: H) -> Self {
        TlsTransport {
            target,
            hook,
            dialer: TcpDialer::new(),
            factory: OpenSslFactory,
        }
    }
}

impl<H, D, F> TlsTransport<H, D, F> {
    pub fn with_parts(target: Target, hook: H, dialer: D, factory: F) -> Self {
        TlsTransport {
            target,
            hook,
            dialer,
            factory,
        }
    }

    pub fn hook(&self) -> &H {
        &self.hook
    }

    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }
}

impl<H, D, F> Transport for TlsTransport<H, D, F>
where
    D: Dialer,
    F: SessionFactory<Stream = D::Stream>,
    H: Handshake<F::Session>,
{
    type Session = F::Session;

    fn target(&self) -> &Target {
        &self.target
    }

    fn open(&self) -> Result<F::Session> {
        let stream = self.dialer.dial(&self.target)?;
        tracing::debug!(server = %self.target, "stream dialled");

        let mut session = self.factory.wrap(stream)?;
        tracing::debug!(server = %self.target, "session wrapped");

        if let Err(e) = self.hook.handshake(&mut session) {
            // Discarded either way; the handshake error is what matters
            let _ = session.close();
            return Err(e.into());
        }

        Ok(session)
    }
}

/// HTTP connection over an authenticated TLS session
pub type HttpsConnection<D = TcpDialer, F = OpenSslFactory> =
    HttpConnection<TlsTransport<Authenticator, D, F>>;

impl HttpConnection<TlsTransport<Authenticator>> {
    /// Start configuring an HTTPS connection to `host`
    pub fn builder(host: impl Into<String>) -> HttpsConnectionBuilder {
        HttpsConnectionBuilder::new(host)
    }
}

/// Builder for `HttpsConnection`
///
/// Credentials are only checked in `build()`, which fails with
/// `TlsError::InvalidConfig` before any socket exists.
#[derive(Debug)]
pub struct HttpsConnectionBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    cert_chain: Option<CertificateChain>,
    private_key: Option<PrivateKey>,
    fingerprint: Option<String>,
    settings: HandshakeSettings,
    timeout: Option<Duration>,
    strict: bool,
}

impl HttpsConnectionBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        HttpsConnectionBuilder {
            host: host.into(),
            port: DEFAULT_HTTPS_PORT,
            username: None,
            password: None,
            cert_chain: None,
            private_key: None,
            fingerprint: None,
            settings: HandshakeSettings::default(),
            timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            strict: false,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn certificate_chain(mut self, chain: CertificateChain) -> Self {
        self.cert_chain = Some(chain);
        self
    }

    pub fn private_key(mut self, key: PrivateKey) -> Self {
        self.private_key = Some(key);
        self
    }

    /// Pin the server's leaf certificate (SHA-1 or SHA-256, hex)
    pub fn fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    pub fn settings(mut self, settings: HandshakeSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Connect and per-operation I/O timeout; `None` blocks indefinitely
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject malformed response header lines
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn build(self) -> std::result::Result<HttpsConnection, TlsError> {
        let dialer = TcpDialer::new().timeout(self.timeout);
        self.build_with(dialer, OpenSslFactory)
    }

    /// Build with a custom dialer and session factory
    ///
    /// The dialer's own timeout applies to connecting; the builder's timeout
    /// still bounds reads and writes.
    pub fn build_with<D, F>(
        self,
        dialer: D,
        factory: F,
    ) -> std::result::Result<HttpsConnection<D, F>, TlsError>
    where
        D: Dialer,
        F: SessionFactory<Stream = D::Stream>,
    {
        let credentials = CredentialSet::new(
            self.username,
            self.password,
            self.cert_chain,
            self.private_key,
            self.fingerprint.as_deref(),
        )?;

        let target = Target::with_port(self.host, self.port);
        let hook = Authenticator::new(credentials, self.settings, target.host());
        tracing::debug!(
            server = %target,
            strategy = hook.strategy().name(),
            "https connection configured"
        );

        let mut conn = HttpConnection::new(TlsTransport::with_parts(target, hook, dialer, factory));
        conn.set_timeout(self.timeout);
        conn.set_strict(self.strict);
        Ok(conn)
    }
}
