//! Raw socket creation
//!
//! This module opens the stream sockets that secure sessions are layered on.
//! Socket creation goes through the [`Dialer`] trait so callers (and tests)
//! can substitute how the raw transport is obtained.

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Default port for HTTP over TLS
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Default bound applied to connect and socket reads/writes
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result type for network operations
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to resolve {target}: {source}")]
    Resolve {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("{0} resolved to no addresses")]
    NoAddresses(String),

    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Connect to {0} timed out")]
    Timeout(SocketAddr),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Host and port of the server a connection talks to
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    host: String,
    port: u16,
}

impl Target {
    /// Create a target on the default HTTPS port
    pub fn new(host: impl Into<String>) -> Self {
        Target {
            host: host.into(),
            port: DEFAULT_HTTPS_PORT,
        }
    }

    /// Create a target with an explicit port
    pub fn with_port(host: impl Into<String>, port: u16) -> Self {
        Target {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Value suitable for the `Host` request header
    pub fn authority(&self) -> String {
        if self.port == DEFAULT_HTTPS_PORT {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Opens raw byte-stream sockets to a target
pub trait Dialer {
    /// Stream type handed to the secure session layer
    type Stream;

    /// Open a brand-new connection to `target`
    fn dial(&self, target: &Target) -> Result<Self::Stream>;
}

impl<D: Dialer + ?Sized> Dialer for &D {
    type Stream = D::Stream;

    fn dial(&self, target: &Target) -> Result<Self::Stream> {
        (**self).dial(target)
    }
}

/// TCP dialer built on `socket2`
#[derive(Debug, Clone)]
pub struct TcpDialer {
    timeout: Option<Duration>,
}

impl TcpDialer {
    /// Create a dialer with the default timeout
    pub fn new() -> Self {
        TcpDialer {
            timeout: Some(DEFAULT_CONNECT_TIMEOUT),
        }
    }

    /// Set the connect/read/write timeout (`None` blocks indefinitely)
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the configured timeout
    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn connect_addr(&self, addr: SocketAddr) -> Result<TcpStream> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        let sock_addr = SockAddr::from(addr);

        let connected = match self.timeout {
            Some(timeout) => socket.connect_timeout(&sock_addr, timeout),
            None => socket.connect(&sock_addr),
        };

        if let Err(e) = connected {
            if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock {
                return Err(Error::Timeout(addr));
            }
            return Err(Error::Connect { addr, source: e });
        }

        // Best-effort guards; not every platform honours them
        let _ = socket.set_nodelay(true);
        let _ = socket.set_read_timeout(self.timeout);
        let _ = socket.set_write_timeout(self.timeout);

        Ok(TcpStream::from(socket))
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialer for TcpDialer {
    type Stream = TcpStream;

    fn dial(&self, target: &Target) -> Result<TcpStream> {
        let addrs: Vec<SocketAddr> = (target.host(), target.port())
            .to_socket_addrs()
            .map_err(|source| Error::Resolve {
                target: target.to_string(),
                source,
            })?
            .collect();

        let mut last_err = Error::NoAddresses(target.to_string());
        for addr in addrs {
            match self.connect_addr(addr) {
                Ok(stream) => {
                    tracing::debug!(server = %target, %addr, "socket connected");
                    return Ok(stream);
                }
                Err(e) => last_err = e,
            }
        }

        Err(last_err)
    }
}
