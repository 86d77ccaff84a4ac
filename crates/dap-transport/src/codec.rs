//! DAP codec implementation using tokio-util.
//!
//! This module provides [`DapCodec`], which implements both the `Encoder` and
//! `Decoder` traits from tokio-util for the DAP wire frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;
use crate::message::OutgoingMessage;

/// Default maximum message size (16 MB).
const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Codec for framing and unframing DAP messages.
///
/// DAP uses a simple Content-Length header protocol:
/// ```text
/// Content-Length: <length>\r\n
/// \r\n
/// <JSON body>
/// ```
///
/// Decoding yields the raw body bytes, not a parsed message: whether those
/// bytes are well-formed JSON shaped like a DAP message is a concern of the
/// layer above (the dispatcher in `dap-client`), so that one unparsable body
/// doesn't have to tear down the whole channel the way a framing error does.
///
/// # Example
///
/// ```ignore
/// use tokio_util::codec::{FramedRead, FramedWrite};
/// use dap_transport::DapCodec;
///
/// let framed = FramedRead::new(reader, DapCodec::new());
/// ```
#[derive(Debug, Clone)]
pub struct DapCodec {
    /// Maximum allowed message size in bytes.
    max_message_size: usize,
}

impl DapCodec {
    /// Create a new codec with default settings.
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Create a new codec with a custom maximum message size.
    ///
    /// Messages larger than this will be rejected with [`CodecError::MessageTooLarge`].
    pub fn with_max_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }
}

impl Default for DapCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for DapCodec {
    type Item = Bytes;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Look for the header/body separator (\r\n\r\n)
        let Some(header_end) = find_header_end(src) else {
            // Need more data
            return Ok(None);
        };

        // Parse the Content-Length header
        let header_bytes = &src[..header_end];
        let content_length = parse_content_length(header_bytes)?;

        // Check message size limit
        if content_length > self.max_message_size {
            return Err(CodecError::MessageTooLarge {
                size: content_length,
                max: self.max_message_size,
            });
        }

        // Calculate total frame length (header + \r\n\r\n + body)
        let total_length = header_end + 4 + content_length;

        // Check if we have the complete frame
        if src.len() < total_length {
            // Need more data - reserve space for efficiency
            src.reserve(total_length - src.len());
            return Ok(None);
        }

        // Drop the header, then split off exactly the body bytes.
        let body_start = header_end + 4;
        src.advance(body_start);
        let body = src.split_to(content_length);

        Ok(Some(body.freeze()))
    }
}

impl Encoder<OutgoingMessage> for DapCodec {
    type Error = CodecError;

    fn encode(&mut self, item: OutgoingMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // Serialize the message to JSON
        let json = serde_json::to_vec(&item).map_err(CodecError::JsonSerialize)?;

        // Write the header
        dst.reserve(32 + json.len()); // "Content-Length: " + digits + "\r\n\r\n" + body
        dst.put_slice(b"Content-Length: ");
        dst.put_slice(json.len().to_string().as_bytes());
        dst.put_slice(b"\r\n\r\n");

        // Write the body
        dst.put_slice(&json);

        Ok(())
    }
}

/// Find the position of the header/body separator (\r\n\r\n).
///
/// Returns the index of the first `\r` in the separator, or None if not found.
fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parse the Content-Length value from the header section.
fn parse_content_length(header: &[u8]) -> Result<usize, CodecError> {
    let header_str = std::str::from_utf8(header).map_err(|_| CodecError::InvalidUtf8)?;

    for line in header_str.split("\r\n") {
        if let Some(value) = line.strip_prefix("Content-Length:") {
            return value
                .trim()
                .parse()
                .map_err(|_| CodecError::MalformedContentLength);
        }
    }

    Err(CodecError::MissingContentLength)
}
