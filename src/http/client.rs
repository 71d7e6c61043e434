//! HTTP exchange over a single session
//!
//! `HttpClient` sends requests and reads responses on one already-open
//! session. Reconnect policy lives in `HttpConnection`.

use super::{HttpRequest, HttpResponse, HttpSession, Method, ResponseParser, Result, SessionOps};
use std::time::Duration;

const READ_CHUNK: usize = 4096;

/// HTTP client bound to one session
pub struct HttpClient<S: SessionOps> {
    session: HttpSession<S>,
    parser: ResponseParser,
    must_close: bool,
}

impl<S: SessionOps> HttpClient<S> {
    pub fn new(session: S) -> Self {
        HttpClient {
            session: HttpSession::new(session),
            parser: ResponseParser::new(),
            must_close: false,
        }
    }

    /// Set the timeout for individual reads and writes
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.session.set_timeout(timeout);
    }

    /// Fail on malformed response header lines instead of skipping them
    pub fn set_strict(&mut self, strict: bool) {
        self.parser.set_strict(strict);
    }

    pub fn send_request(&mut self, request: &HttpRequest) -> Result<()> {
        self.session.write_all(&request.to_wire())
    }

    /// Receive the response to a request made with `method`
    pub fn receive_response(&mut self, method: Method) -> Result<HttpResponse> {
        self.parser.reset();
        self.parser.set_head_request(method == Method::Head);

        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = self.session.read(&mut buf)?;

            if n == 0 {
                let closed_body = self.parser.delimited_by_close();
                let response = self.parser.finish()?;
                self.must_close = closed_body;
                return Ok(response);
            }

            if let Some(response) = self.parser.parse(&buf[..n])? {
                self.must_close = response.wants_close();
                return Ok(response);
            }
        }
    }

    /// Whether the last response left the session unusable for another request
    pub fn must_close(&self) -> bool {
        self.must_close
    }

    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }

    pub fn session(&self) -> &HttpSession<S> {
        &self.session
    }
}
