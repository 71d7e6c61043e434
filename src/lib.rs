//! tlshttp - HTTP/1.1 over authenticated TLS sessions
//!
//! This crate lets a blocking HTTP client run over a TLS session instead of a
//! raw socket. The transport is obtained through a hook, so the HTTP layer is
//! unaware of whether it talks to plain TCP or to an OpenSSL session that was
//! authenticated with a password (TLS-PSK), a client certificate or a pinned
//! server fingerprint.

pub mod http;
pub mod net;
