//! TLS support for HTTP connections
//!
//! This module layers authenticated TLS sessions under `HttpConnection`
//! without the HTTP code knowing about it.
//!
//! # Architecture
//!
//! The TLS implementation uses the session operations abstraction pattern:
//!
//! 1. `TlsTransport` is the `Transport` hook: it dials a socket, wraps it in a
//!    `SecureSession` and runs a `Handshake` hook on it for every new
//!    connection
//! 2. `Authenticator` is the hook used in practice: it resolves the supplied
//!    credentials into an `AuthStrategy` once, then issues exactly one
//!    `handshake_client` call per session
//! 3. `OpenSslSession` implements `SecureSession` (and so `SessionOps`) on top
//!    of OpenSSL
//!
//! # Authentication
//!
//! - password: TLS-PSK with a key derived by [`derive_psk`]; both sides prove
//!   possession of the key, which also authenticates the server
//! - certificate: X.509 client certificate and private key
//! - fingerprint: the server's leaf certificate must match a pinned SHA-1 or
//!   SHA-256 digest
//!
//! A client authenticates with a password or a certificate, not both. Either
//! may be combined with a pin; a password with a pin negotiates RSA-PSK
//! suites, in which the server still presents a certificate to check. A
//! connection with neither a pin nor a password does not authenticate the
//! server.
//!
//! # Examples
//!
//! ```no_run
//! use tlshttp::http::tls::HttpsConnection;
//!
//! let mut conn = HttpsConnection::builder("api.example.test")
//!     .username("alice")
//!     .password("secret")
//!     .build()
//!     .unwrap();
//!
//! let response = conn.get("/status").unwrap();
//! println!("{}", response.text());
//! ```
//!
//! Pinning the server certificate and presenting a client certificate:
//!
//! ```no_run
//! use tlshttp::http::tls::{CertificateChain, HttpsConnection, PrivateKey};
//!
//! let mut conn = HttpsConnection::builder("api.example.test")
//!     .port(8443)
//!     .certificate_chain(CertificateChain::from_pem_file("client.pem").unwrap())
//!     .private_key(PrivateKey::from_pem_file("client.key").unwrap())
//!     .fingerprint("3f:a2:...:9c")
//!     .build()
//!     .unwrap();
//! ```

pub mod adapter;
pub mod auth;
pub mod cert;
pub mod config;
pub mod credentials;
pub mod handshake;
pub mod info;
pub mod session;

#[cfg(test)]
pub(crate) mod testutil;

pub use adapter::{HttpsConnection, HttpsConnectionBuilder, TlsTransport};
pub use auth::{AuthStrategy, Authenticator, ServerAuth};
pub use cert::CertInfo;
pub use config::{HandshakeSettings, HandshakeSettingsBuilder, TlsError, TlsVersion};
pub use credentials::{
    derive_psk, CertificateChain, CertificateCredential, CredentialSet, Fingerprint,
    FingerprintAlgorithm, PasswordCredential, PrivateKey,
};
pub use handshake::{Handshake, HandshakeRequest};
pub use info::SessionInfo;
pub use session::{OpenSslFactory, OpenSslSession, SecureSession, SessionFactory};

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;
