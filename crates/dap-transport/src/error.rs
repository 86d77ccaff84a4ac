//! Error types for the framing layer.

use std::io;

/// Errors that can occur while framing bytes on the wire.
///
/// Framing errors are always fatal for the channel: a missing or
/// malformed `Content-Length` header means the byte stream can no
/// longer be trusted to contain frame boundaries. JSON-shape errors
/// are deliberately *not* represented here - they are the concern of
/// whatever parses a frame's body into a typed message, one layer up,
/// and a bad body must not kill the channel (see the dispatcher's
/// `DecodeFailure` handling in `dap-client`).
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// An I/O error occurred while reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The header section contained invalid UTF-8.
    #[error("invalid UTF-8 in header")]
    InvalidUtf8,

    /// The Content-Length header value could not be parsed as an integer.
    #[error("malformed Content-Length header value")]
    MalformedContentLength,

    /// No Content-Length header was found in the message.
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// The frame body exceeds the configured maximum size.
    #[error("message size {size} exceeds maximum allowed {max}")]
    MessageTooLarge {
        /// The actual message size.
        size: usize,
        /// The maximum allowed size.
        max: usize,
    },

    /// Failed to serialize an outgoing message to JSON.
    #[error("JSON serialization failed: {0}")]
    JsonSerialize(#[source] serde_json::Error),
}
