//! HTTP/1.1 client connection
//!
//! This module provides the HTTP connection abstraction that the TLS adapter
//! plugs into.
//!
//! # Architecture
//!
//! The HTTP layer never creates sockets itself:
//!
//! - `SessionOps` defines the byte-stream operations (poll, read, write, close)
//! - `Transport` is the hook through which `HttpConnection` obtains a fresh
//!   `SessionOps` implementation every time it (re)connects
//! - `PlainTransport` yields plain TCP sessions, `tls::TlsTransport` yields
//!   handshaken TLS sessions
//!
//! All request/response code is transparent to the underlying transport.
//!
//! # Examples
//!
//! ```no_run
//! use tlshttp::http::{HttpConnection, PlainTransport};
//! use tlshttp::net::Target;
//!
//! let mut conn = HttpConnection::new(PlainTransport::new(Target::with_port("127.0.0.1", 8080)));
//! let response = conn.get("/").unwrap();
//! assert_eq!(response.status().code(), 200);
//! ```

pub mod chunked;
pub mod client;
pub mod connection;
pub mod headers;
pub mod message;
pub mod parser;
pub mod session;
pub mod tls;
pub mod transport;

pub use client::HttpClient;
pub use connection::HttpConnection;
pub use headers::Headers;
pub use message::{HttpRequest, HttpResponse, Method, Status, Version};
pub use parser::ResponseParser;
pub use session::{FdSessionOps, HttpSession, PollEvents, SessionOps};
pub use tls::HttpsConnection;
pub use transport::{PlainTransport, Transport};

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] crate::net::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] tls::TlsError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Not connected")]
    NotConnected,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Maximum number of headers per message
pub const MAX_HEADERS: usize = 64;

/// CRLF line ending
pub const CRLF: &str = "\r\n";
