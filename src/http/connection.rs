//! HTTP connection with transport hook
//!
//! `HttpConnection` is the reconnecting, persistent HTTP/1.1 connection the
//! rest of the crate builds on. It obtains each underlying session from its
//! `Transport`, so a TLS transport only has to provide `open()`.
//!
//! Lifecycle:
//!
//! - `connect()` discards any current session and asks the transport for a
//!   new one; on failure the connection stays disconnected
//! - `request()` connects first if needed, then sends
//! - `get_response()` reads the response; a response that ends the
//!   connection drops the session so the next `request()` reconnects

use super::{Error, HttpClient, HttpRequest, HttpResponse, Method, Result, Transport};
use crate::net::Target;
use std::time::Duration;

/// Persistent HTTP/1.1 connection over a pluggable transport
pub struct HttpConnection<T: Transport> {
    transport: T,
    client: Option<HttpClient<T::Session>>,
    timeout: Option<Duration>,
    strict: bool,
    pending: Option<Method>,
}

impl<T: Transport> HttpConnection<T> {
    /// Create a connection; no network I/O happens until first use
    pub fn new(transport: T) -> Self {
        HttpConnection {
            transport,
            client: None,
            timeout: Some(crate::net::DEFAULT_CONNECT_TIMEOUT),
            strict: false,
            pending: None,
        }
    }

    pub fn target(&self) -> &Target {
        self.transport.target()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Set the per-read/write timeout for current and future sessions
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
        if let Some(client) = self.client.as_mut() {
            client.set_timeout(timeout);
        }
    }

    /// Treat malformed response header lines as errors
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
        if let Some(client) = self.client.as_mut() {
            client.set_strict(strict);
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// The session of the current underlying connection, if any
    pub fn session(&self) -> Option<&T::Session> {
        self.client.as_ref().map(|c| c.session().get_ref())
    }

    /// Open a new underlying connection through the transport
    ///
    /// Any existing session is closed first. Transport and handshake errors
    /// are returned unchanged and leave the connection disconnected.
    pub fn connect(&mut self) -> Result<()> {
        self.disconnect();

        let session = self.transport.open()?;
        let mut client = HttpClient::new(session);
        client.set_timeout(self.timeout);
        client.set_strict(self.strict);
        self.client = Some(client);

        tracing::debug!(server = %self.transport.target(), "connection established");
        Ok(())
    }

    /// Send a request, connecting first if there is no live session
    ///
    /// A `Host` header is added from the target when the request has none.
    pub fn request(&mut self, mut request: HttpRequest) -> Result<()> {
        if self.pending.is_some() {
            return Err(Error::Protocol(
                "previous response has not been read".to_string(),
            ));
        }

        if self.client.is_none() {
            self.connect()?;
        }

        if !request.headers().contains("Host") {
            let authority = self.transport.target().authority();
            request.headers_mut().insert("Host", authority);
        }

        let client = self.client.as_mut().ok_or(Error::NotConnected)?;
        if let Err(e) = client.send_request(&request) {
            self.disconnect();
            return Err(e);
        }

        self.pending = Some(request.method());
        Ok(())
    }

    /// Read the response to the last request
    pub fn get_response(&mut self) -> Result<HttpResponse> {
        let client = self.client.as_mut().ok_or(Error::NotConnected)?;
        let method = self
            .pending
            .take()
            .ok_or_else(|| Error::Protocol("no request pending".to_string()))?;

        match client.receive_response(method) {
            Ok(response) => {
                if client.must_close() {
                    self.disconnect();
                }
                Ok(response)
            }
            Err(e) => {
                self.disconnect();
                Err(e)
            }
        }
    }

    /// Send a request and wait for its response
    pub fn send(&mut self, request: HttpRequest) -> Result<HttpResponse> {
        self.request(request)?;
        self.get_response()
    }

    pub fn get(&mut self, uri: &str) -> Result<HttpResponse> {
        self.send(HttpRequest::new(Method::Get, uri))
    }

    pub fn post(&mut self, uri: &str, body: Vec<u8>) -> Result<HttpResponse> {
        let request = HttpRequest::builder()
            .method(Method::Post)
            .uri(uri)
            .body(body)
            .build();
        self.send(request)
    }

    /// Close the current session, if any
    pub fn close(&mut self) -> Result<()> {
        self.pending = None;
        match self.client.take() {
            Some(mut client) => {
                tracing::debug!(server = %self.transport.target(), "closing connection");
                client.close()
            }
            None => Ok(()),
        }
    }

    fn disconnect(&mut self) {
        // The session is being discarded; a failed shutdown changes nothing
        let _ = self.close();
    }
}
