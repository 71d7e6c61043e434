//! Chunked transfer decoding
//!
//! Incremental decoder for `Transfer-Encoding: chunked` response bodies.

use super::{Error, Result};

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Size,
    Data { remaining: usize },
    DataEnd,
    Trailer,
    Complete,
}

/// Chunked body decoder
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: State,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        ChunkedDecoder { state: State::Size }
    }

    /// Decode as much of `input` as possible, appending payload to `output`
    ///
    /// Returns the number of input bytes consumed. Trailer fields are
    /// skipped.
    pub fn decode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        let mut pos = 0;

        loop {
            let rest = &input[pos..];
            match self.state {
                State::Size => {
                    let Some(eol) = find_crlf(rest) else { break };
                    let line = String::from_utf8_lossy(&rest[..eol]);
                    let size_str = line.split(';').next().unwrap_or("").trim();
                    let size = usize::from_str_radix(size_str, 16)
                        .map_err(|_| Error::InvalidChunkSize(size_str.to_string()))?;
                    pos += eol + 2;
                    self.state = if size == 0 {
                        State::Trailer
                    } else {
                        State::Data { remaining: size }
                    };
                }
                State::Data { remaining } => {
                    if rest.is_empty() {
                        break;
                    }
                    let n = remaining.min(rest.len());
                    output.extend_from_slice(&rest[..n]);
                    pos += n;
                    self.state = if n == remaining {
                        State::DataEnd
                    } else {
                        State::Data { remaining: remaining - n }
                    };
                }
                State::DataEnd => {
                    if rest.len() < 2 {
                        break;
                    }
                    if &rest[..2] != b"\r\n" {
                        return Err(Error::Protocol("Expected CRLF after chunk".to_string()));
                    }
                    pos += 2;
                    self.state = State::Size;
                }
                State::Trailer => {
                    let Some(eol) = find_crlf(rest) else { break };
                    pos += eol + 2;
                    if eol == 0 {
                        self.state = State::Complete;
                    }
                }
                State::Complete => break,
            }
        }

        Ok(pos)
    }

    pub fn is_complete(&self) -> bool {
        self.state == State::Complete
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}
