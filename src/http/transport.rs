//! Transport hook
//!
//! `HttpConnection` never opens sockets itself. Each time it needs a new
//! underlying connection it asks its `Transport` for one, which is where TLS
//! (or anything else) gets layered in.

use super::session::FdSessionOps;
use super::{Result, SessionOps};
use crate::net::{Dialer, Target, TcpDialer};
use std::net::TcpStream;

/// Factory for the byte-stream sessions an HTTP connection runs over
pub trait Transport {
    type Session: SessionOps;

    /// The server this transport connects to
    fn target(&self) -> &Target;

    /// Open a brand-new, ready-to-use session
    ///
    /// Called once per underlying connection. Implementations must not reuse
    /// state from a previous call.
    fn open(&self) -> Result<Self::Session>;
}

/// Cleartext TCP transport
#[derive(Debug, Clone)]
pub struct PlainTransport<D = TcpDialer> {
    target: Target,
    dialer: D,
}

impl PlainTransport {
    pub fn new(target: Target) -> Self {
        PlainTransport {
            target,
            dialer: TcpDialer::new(),
        }
    }
}

impl<D> PlainTransport<D> {
    pub fn with_dialer(target: Target, dialer: D) -> Self {
        PlainTransport { target, dialer }
    }
}

impl<D: Dialer<Stream = TcpStream>> Transport for PlainTransport<D> {
    type Session = FdSessionOps;

    fn target(&self) -> &Target {
        &self.target
    }

    fn open(&self) -> Result<FdSessionOps> {
        let stream = self.dialer.dial(&self.target)?;
        Ok(FdSessionOps::new(stream))
    }
}
