//! Tokio codec for newline-delimited text frames.
//!
//! # Overview
//!
//! `LineCodec` implements:
//! - [`Decoder`]: splits a byte stream on `\n`, strips an optional trailing
//!   `\r`, and validates UTF-8
//! - [`Encoder`]: writes any `Display` value followed by `\r\n`
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use tokio::net::TcpStream;
//! use tokio_util::codec::Framed;
//! use garagedoor_protocol::{Command, LineCodec};
//! use futures::{SinkExt, StreamExt};
//!
//! # async fn example() -> garagedoor_core::Result<()> {
//! let stream = TcpStream::connect("127.0.0.1:17000").await?;
//! let mut framed = Framed::new(stream, LineCodec::new());
//!
//! if let Some(Ok(greeting)) = framed.next().await {
//!     println!("Server says {greeting}");
//! }
//! framed.send(Command::Status).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # DoS Protection
//!
//! A line longer than the configured maximum (default 8192 bytes) is an
//! error. The codec reports it as soon as the buffered bytes exceed the
//! limit instead of waiting for a terminator that may never come.

use bytes::{BufMut, BytesMut};
use std::fmt;
use tokio_util::codec::{Decoder, Encoder};

use garagedoor_core::constants::{LINE_TERMINATOR, MAX_LINE_LENGTH};
use garagedoor_core::{Error, Result};

/// Newline-delimited UTF-8 codec.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Maximum allowed line length in bytes, excluding the terminator.
    max_length: usize,

    /// Index up to which the buffer is known to hold no `\n`.
    next_index: usize,
}

impl LineCodec {
    /// Create a codec with the default maximum line length.
    ///
    /// ```
    /// use garagedoor_protocol::LineCodec;
    ///
    /// let codec = LineCodec::new();
    /// assert_eq!(codec.max_length(), 8192);
    /// ```
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    /// Create a codec with a custom maximum line length.
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
        }
    }

    /// Get the current maximum line length.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn line_from(&self, raw: &[u8]) -> Result<String> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.len() > self.max_length {
            return Err(Error::LineTooLong {
                length: raw.len(),
                max_length: self.max_length,
            });
        }
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|_| Error::InvalidUtf8)
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = Error;

    /// Decode the next complete line from the buffer.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(line))` - A complete line, without its terminator
    /// - `Ok(None)` - Need more data
    /// - `Err(Error)` - Line too long or not UTF-8
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let newline = src[self.next_index..]
            .iter()
            .position(|byte| *byte == b'\n')
            .map(|offset| self.next_index + offset);

        match newline {
            Some(index) => {
                self.next_index = 0;
                let frame = src.split_to(index + 1);
                self.line_from(&frame[..index]).map(Some)
            }
            // +1 leaves room for a `\r` that belongs to the terminator.
            None if src.len() > self.max_length + 1 => Err(Error::LineTooLong {
                length: src.len(),
                max_length: self.max_length,
            }),
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    /// A trailing partial line at end of stream is discarded.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None => {
                src.clear();
                self.next_index = 0;
                Ok(None)
            }
        }
    }
}

impl<T: fmt::Display> Encoder<T> for LineCodec {
    type Error = Error;

    /// Write `item` followed by `\r\n`.
    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<()> {
        let line = item.to_string();
        dst.reserve(line.len() + LINE_TERMINATOR.len());
        dst.put_slice(line.as_bytes());
        dst.put_slice(LINE_TERMINATOR.as_bytes());
        Ok(())
    }
}
