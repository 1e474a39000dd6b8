//! Line framing for tokio.
//!
//! Splits the inbound byte stream on `\n`, tolerating a missing `\r`. A line
//! over the length limit is reported once and the rest of it is skipped up to
//! the next newline, so the connection stays usable.

use crate::message::MAX_LINE_LENGTH;
use crate::{Error, Malformation, Message, Result};
use bytes::BytesMut;
use std::io;
use tokio_util::codec::Decoder;

/// Newline-delimited codec producing parsed [`Message`]s.
///
/// Each decoded item is itself a `Result`: a malformed line is a per-line
/// condition for the caller to report, while the outer `io::Error` is fatal
/// to the stream.
#[derive(Debug)]
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    /// Maximum line length, terminator included
    max_len: usize,
    /// Skipping the tail of an overlong line
    discarding: bool,
}

impl LineCodec {
    /// Create a codec with the standard 512 byte limit
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LENGTH)
    }

    /// Create a codec with a custom maximum line length
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }

    fn too_long(&self) -> Error {
        Error::MalformedLine(Malformation::TooLong(self.max_len))
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = Result<Message>;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Result<Message>>> {
        loop {
            let newline = src[self.next_index..].iter().position(|b| *b == b'\n');
            let Some(offset) = newline else {
                if self.discarding {
                    src.clear();
                    self.next_index = 0;
                    return Ok(None);
                }
                if src.len() > self.max_len {
                    // Report now, drop bytes until the line finally ends
                    src.clear();
                    self.next_index = 0;
                    self.discarding = true;
                    return Ok(Some(Err(self.too_long())));
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.len() > self.max_len {
                return Ok(Some(Err(self.too_long())));
            }

            let text = String::from_utf8_lossy(&line);
            return Ok(Some(Message::parse(&text)));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<Result<Message>>> {
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }
        if src.is_empty() || self.discarding {
            src.clear();
            return Ok(None);
        }
        // Unterminated final line
        let line = src.split_to(src.len());
        self.next_index = 0;
        Ok(Some(Message::parse(&String::from_utf8_lossy(&line))))
    }
}
