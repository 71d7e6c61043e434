//! HTTP response parsing
//!
//! Incremental parser: feed it bytes as they arrive and it yields a complete
//! response once the status line, headers and body framing are satisfied.

use super::chunked::ChunkedDecoder;
use super::{Error, Headers, HttpResponse, Result, Status, Version};

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parse HTTP response status line
///
/// Format: VERSION STATUS [REASON]
pub fn parse_status_line(line: &str) -> Result<(Version, Status, String)> {
    let mut parts = line.splitn(3, ' ');
    let version = Version::from_str(parts.next().unwrap_or(""))?;

    let code_str = parts
        .next()
        .ok_or_else(|| Error::Parse(format!("Invalid status line: {}", line)))?;
    let code = code_str
        .parse::<u16>()
        .map_err(|_| Error::Parse(format!("Invalid status code: {}", code_str)))?;
    let status = Status::new(code)?;
    let reason = parts.next().unwrap_or("").to_string();

    Ok((version, status, reason))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Framing {
    Length(usize),
    Chunked,
    UntilClose,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    StatusLine,
    Headers,
    Body(Framing),
    Complete,
}

/// HTTP response parser
pub struct ResponseParser {
    state: State,
    buffer: Vec<u8>,
    head_request: bool,
    strict: bool,
    version: Version,
    status: Status,
    reason: String,
    headers: Headers,
    body: Vec<u8>,
    chunked: ChunkedDecoder,
}

impl ResponseParser {
    pub fn new() -> Self {
        ResponseParser {
            state: State::StatusLine,
            buffer: Vec::new(),
            head_request: false,
            strict: false,
            version: Version::default(),
            status: Status::OK,
            reason: String::new(),
            headers: Headers::new(),
            body: Vec::new(),
            chunked: ChunkedDecoder::new(),
        }
    }

    /// Responses to HEAD carry headers only
    pub fn set_head_request(&mut self, head: bool) {
        self.head_request = head;
    }

    /// Reject malformed header lines instead of skipping them
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Feed data to the parser
    ///
    /// Returns Ok(Some(response)) when a complete response is parsed,
    /// Ok(None) if more data is needed.
    pub fn parse(&mut self, data: &[u8]) -> Result<Option<HttpResponse>> {
        self.buffer.extend_from_slice(data);

        loop {
            match self.state {
                State::StatusLine => {
                    let Some(eol) = find_crlf(&self.buffer) else { return Ok(None) };
                    let line = String::from_utf8_lossy(&self.buffer[..eol]).into_owned();
                    self.buffer.drain(..eol + 2);

                    let (version, status, reason) = parse_status_line(&line)?;
                    self.version = version;
                    self.status = status;
                    self.reason = reason;
                    self.state = State::Headers;
                }
                State::Headers => {
                    let Some(eol) = find_crlf(&self.buffer) else { return Ok(None) };
                    if eol > 0 {
                        let line = String::from_utf8_lossy(&self.buffer[..eol]).into_owned();
                        self.buffer.drain(..eol + 2);
                        match Headers::parse_line(&line) {
                            Ok((name, value)) => self.headers.insert(name, value),
                            Err(e) if self.strict => return Err(e),
                            Err(_) => tracing::debug!(line = %line, "skipping malformed header"),
                        }
                        continue;
                    }
                    self.buffer.drain(..2);

                    if self.status.is_informational() {
                        // Interim response (e.g. 100 Continue): wait for the final one
                        self.headers.clear();
                        self.state = State::StatusLine;
                        continue;
                    }

                    match self.framing()? {
                        Some(framing) => self.state = State::Body(framing),
                        None => return Ok(Some(self.complete())),
                    }
                }
                State::Body(Framing::Length(remaining)) => {
                    let n = remaining.min(self.buffer.len());
                    self.body.extend(self.buffer.drain(..n));
                    if n < remaining {
                        self.state = State::Body(Framing::Length(remaining - n));
                        return Ok(None);
                    }
                    return Ok(Some(self.complete()));
                }
                State::Body(Framing::Chunked) => {
                    let consumed = self.chunked.decode(&self.buffer, &mut self.body)?;
                    self.buffer.drain(..consumed);
                    if !self.chunked.is_complete() {
                        return Ok(None);
                    }
                    return Ok(Some(self.complete()));
                }
                State::Body(Framing::UntilClose) => {
                    self.body.append(&mut self.buffer);
                    return Ok(None);
                }
                State::Complete => return Ok(None),
            }
        }
    }

    /// Signal end of stream
    ///
    /// Completes a body delimited by connection close; anything else is a
    /// truncated message.
    pub fn finish(&mut self) -> Result<HttpResponse> {
        match self.state {
            State::Body(Framing::UntilClose) => {
                self.body.append(&mut self.buffer);
                Ok(self.complete())
            }
            _ => Err(Error::ConnectionClosed),
        }
    }

    /// Whether the body in progress is terminated by connection close
    pub fn delimited_by_close(&self) -> bool {
        self.state == State::Body(Framing::UntilClose)
    }

    /// Reset the parser for the next response
    pub fn reset(&mut self) {
        let strict = self.strict;
        *self = ResponseParser::new();
        self.strict = strict;
    }

    fn framing(&self) -> Result<Option<Framing>> {
        if self.head_request || !self.status.permits_body() {
            return Ok(None);
        }

        if self.headers.has_token("Transfer-Encoding", "chunked") {
            return Ok(Some(Framing::Chunked));
        }

        if let Some(cl) = self.headers.get("Content-Length") {
            let len = cl
                .parse::<usize>()
                .map_err(|_| Error::Parse(format!("Invalid Content-Length: {}", cl)))?;
            return Ok(if len == 0 { None } else { Some(Framing::Length(len)) });
        }

        Ok(Some(Framing::UntilClose))
    }

    fn complete(&mut self) -> HttpResponse {
        self.state = State::Complete;
        HttpResponse::new(
            self.version,
            self.status,
            std::mem::take(&mut self.reason),
            std::mem::take(&mut self.headers),
            std::mem::take(&mut self.body),
        )
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}
