//! Secure session operations
//!
//! A secure session starts life wrapping a connected TCP stream. The
//! handshake hook calls `handshake_client` on it exactly once; only after that
//! succeeds does it carry HTTP bytes through the `SessionOps` trait.
//!
//! `OpenSslSession` builds a fresh `SslContext` for every handshake, so no
//! callback state or key material outlives the connection it was made for.

use super::config::TlsError;
use super::credentials::{CertificateCredential, Fingerprint, PasswordCredential};
use super::handshake::HandshakeRequest;
use super::info::SessionInfo;
use crate::http::session::{poll_fd, PollEvents, SessionOps};
use crate::http::{Error, Result as HttpResult};
use openssl::error::ErrorStack;
use openssl::ssl::{
    Ssl, SslContext, SslContextBuilder, SslMethod, SslStream, SslVerifyMode, SslVersion,
};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::fd::AsRawFd;
use std::time::Duration;

/// Cipher list used for password authentication unless overridden
pub const PSK_CIPHER_LIST: &str = "PSK";

/// Cipher list for password authentication against a pinned server
///
/// RSA-PSK suites are the PSK suites in which the server still sends its
/// certificate, so the pin has something to match.
pub const PINNED_PSK_CIPHER_LIST: &str = "RSAPSK";

/// Session that can run a client handshake
pub trait SecureSession: SessionOps {
    /// Authenticate with the server using the parameters in `request`
    ///
    /// Called at most once per session. On error the session must refuse all
    /// further reads and writes.
    fn handshake_client(&mut self, request: &HandshakeRequest<'_>) -> Result<(), TlsError>;
}

/// Wraps a freshly dialed stream into a secure session
pub trait SessionFactory {
    type Stream;
    type Session: SecureSession;

    fn wrap(&self, stream: Self::Stream) -> Result<Self::Session, TlsError>;
}

/// Factory for `OpenSslSession`
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSslFactory;

impl SessionFactory for OpenSslFactory {
    type Stream = TcpStream;
    type Session = OpenSslSession;

    fn wrap(&self, stream: TcpStream) -> Result<OpenSslSession, TlsError> {
        Ok(OpenSslSession::new(stream))
    }
}

enum State {
    /// Connected, not yet handshaken
    Raw(TcpStream),
    Established(Box<SslStream<TcpStream>>),
    /// Handshake or pin check failed
    Failed,
    Closed,
}

/// OpenSSL-backed secure session over TCP
pub struct OpenSslSession {
    state: State,
    info: Option<SessionInfo>,
}

impl OpenSslSession {
    pub fn new(stream: TcpStream) -> Self {
        OpenSslSession {
            state: State::Raw(stream),
            info: None,
        }
    }

    pub fn is_established(&self) -> bool {
        matches!(self.state, State::Established(_))
    }

    /// Negotiated parameters, once the handshake has completed
    pub fn info(&self) -> Option<&SessionInfo> {
        self.info.as_ref()
    }

    fn stream_mut(&mut self) -> HttpResult<&mut SslStream<TcpStream>> {
        match &mut self.state {
            State::Established(stream) => Ok(&mut **stream),
            State::Closed => Err(Error::ConnectionClosed),
            State::Raw(_) | State::Failed => Err(Error::Tls(TlsError::NotEstablished)),
        }
    }

    fn context(request: &HandshakeRequest<'_>) -> Result<SslContext, TlsError> {
        if request.password.is_some() && request.certificate.is_some() {
            return Err(TlsError::InvalidConfig(
                "password and certificate authentication cannot be combined".to_string(),
            ));
        }

        let mut builder = SslContext::builder(SslMethod::tls_client())?;
        builder.set_verify(SslVerifyMode::NONE);
        request.settings.apply(&mut builder)?;

        if let Some(password) = request.password {
            configure_psk(&mut builder, password)?;
            if request.settings.max_version().is_none() {
                builder.set_max_proto_version(Some(SslVersion::TLS1_2))?;
            }
            if request.settings.cipher_list().is_none() {
                builder.set_cipher_list(psk_cipher_list(request))?;
            }
        }

        if let Some(certificate) = request.certificate {
            configure_certificate(&mut builder, certificate)?;
        }

        Ok(builder.build())
    }
}

/// Default cipher list for a password handshake
fn psk_cipher_list(request: &HandshakeRequest<'_>) -> &'static str {
    if request.fingerprint.is_some() {
        PINNED_PSK_CIPHER_LIST
    } else {
        PSK_CIPHER_LIST
    }
}

fn configure_psk(
    builder: &mut SslContextBuilder,
    password: &PasswordCredential,
) -> Result<(), TlsError> {
    let identity = password.username().as_bytes().to_vec();
    let key = password.psk()?;

    builder.set_psk_client_callback(move |_ssl, _hint, identity_out, psk_out| {
        // identity is written NUL-terminated
        if identity.len() >= identity_out.len() || key.len() > psk_out.len() {
            return Err(ErrorStack::get());
        }
        identity_out[..identity.len()].copy_from_slice(&identity);
        identity_out[identity.len()] = 0;
        psk_out[..key.len()].copy_from_slice(&key);
        Ok(key.len())
    });
    Ok(())
}

fn configure_certificate(
    builder: &mut SslContextBuilder,
    certificate: &CertificateCredential,
) -> Result<(), TlsError> {
    let chain = certificate.chain();
    builder.set_certificate(chain.leaf())?;
    for cert in chain.intermediates() {
        builder.add_extra_chain_cert(cert.clone())?;
    }
    builder.set_private_key(certificate.key().as_pkey())?;
    builder.check_private_key()?;
    Ok(())
}

fn check_pin(stream: &SslStream<TcpStream>, pin: &Fingerprint) -> Result<(), TlsError> {
    let cert = stream
        .ssl()
        .peer_certificate()
        .ok_or(TlsError::NoPeerCertificate)?;

    if pin.matches(&cert)? {
        return Ok(());
    }

    let actual = Fingerprint::of(&cert, pin.algorithm())?;
    Err(TlsError::FingerprintMismatch {
        expected: pin.to_hex(),
        actual: actual.to_hex(),
    })
}

fn shutdown_tcp(stream: &TcpStream) -> io::Result<()> {
    match stream.shutdown(Shutdown::Both) {
        Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
        other => other,
    }
}

impl SecureSession for OpenSslSession {
    fn handshake_client(&mut self, request: &HandshakeRequest<'_>) -> Result<(), TlsError> {
        let tcp = match std::mem::replace(&mut self.state, State::Failed) {
            State::Raw(tcp) => tcp,
            other => {
                self.state = other;
                return Err(TlsError::HandshakeFailed(
                    "session has already been handshaken".to_string(),
                ));
            }
        };

        let ctx = Self::context(request)?;
        let mut ssl = Ssl::new(&ctx)?;
        if let Some(sni) = request.sni() {
            ssl.set_hostname(sni)?;
        }
        if request.settings.verifies_chain() {
            ssl.param_mut().set_host(request.server_name)?;
        }

        let stream = ssl
            .connect(tcp)
            .map_err(|e| TlsError::HandshakeFailed(e.to_string()))?;

        if let Some(pin) = request.fingerprint {
            if let Err(e) = check_pin(&stream, pin) {
                let _ = shutdown_tcp(stream.get_ref());
                return Err(e);
            }
        }

        let info = SessionInfo::from_ssl(stream.ssl());
        tracing::debug!(
            version = %info.version,
            cipher = info.cipher.as_deref().unwrap_or("<none>"),
            pinned = request.fingerprint.is_some(),
            "TLS handshake complete"
        );

        self.info = Some(info);
        self.state = State::Established(Box::new(stream));
        Ok(())
    }
}

impl SessionOps for OpenSslSession {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> HttpResult<bool> {
        match &self.state {
            State::Established(stream) => {
                // Decrypted bytes may already be buffered inside OpenSSL
                if events != PollEvents::Write && stream.ssl().pending() > 0 {
                    return Ok(true);
                }
                poll_fd(stream.get_ref().as_raw_fd(), events, timeout)
            }
            State::Closed => Err(Error::ConnectionClosed),
            State::Raw(_) | State::Failed => Err(Error::Tls(TlsError::NotEstablished)),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> HttpResult<usize> {
        let stream = self.stream_mut()?;
        stream.read(buf).map_err(Error::from)
    }

    fn write(&mut self, buf: &[u8]) -> HttpResult<usize> {
        let stream = self.stream_mut()?;
        stream.write(buf).map_err(Error::from)
    }

    fn flush(&mut self) -> HttpResult<()> {
        let stream = self.stream_mut()?;
        stream.flush().map_err(Error::from)
    }

    fn close(&mut self) -> HttpResult<()> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Established(mut stream) => {
                // close_notify is best effort; the peer may already be gone
                let _ = stream.shutdown();
                shutdown_tcp(stream.get_ref()).map_err(Error::from)
            }
            State::Raw(tcp) => shutdown_tcp(&tcp).map_err(Error::from),
            State::Failed | State::Closed => Ok(()),
        }
    }
}
