//! Async DAP transport layer using tokio.
//!
//! This crate provides the wire-framing layer for the Debug Adapter
//! Protocol (DAP): reassembling `Content-Length`-prefixed frames out of
//! an async byte stream, and writing them back out. It knows nothing
//! about sequence numbers, request/response correlation, or the
//! `initialize` handshake - that belongs to `dap-client`, one layer up.
//!
//! # Architecture
//!
//! The crate is designed around the tokio-util codec pattern:
//!
//! - [`DapCodec`] implements both `Encoder` and `Decoder` for DAP frames
//! - [`DapReader`] wraps an `AsyncRead` to produce a `Stream` of raw frame bodies
//! - [`DapWriter`] wraps an `AsyncWrite` to provide a `Sink` for outgoing messages
//!
//! Decoding stops at the frame boundary: a [`DapReader`] yields the raw
//! JSON bytes of each frame, not a parsed [`Message`]. Whether those
//! bytes deserialize into something DAP-shaped is left to the caller,
//! so a single malformed body doesn't have to be treated the same as a
//! torn `Content-Length` header.
//!
//! # Usage
//!
//! ```ignore
//! use dap_transport::{connect, Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (mut reader, mut writer) = connect("127.0.0.1:5678").await?;
//!
//!     // Send a request
//!     writer.send(/* request */).await?;
//!
//!     // Read frames and parse them
//!     while let Some(body) = reader.next().await {
//!         let msg: Message = serde_json::from_slice(&body?)?;
//!         match msg {
//!             Message::Response(r) => { /* handle response */ }
//!             Message::Event(e) => { /* handle event */ }
//!             Message::Request(r) => { /* handle reverse request */ }
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Scope
//!
//! This crate intentionally handles only framing and transport concerns:
//! - Encoding outgoing messages to the DAP wire format
//! - Decoding incoming bytes into raw frame bodies
//! - Providing split reader/writer pairs over TCP, stdio, or an
//!   in-memory pipe for upstream multiplexing
//!
//! Message parsing, request-response correlation, and event routing
//! belong in `dap-client`.

mod codec;
mod error;
mod message;
mod reader;
mod transport;
mod writer;

pub mod testing;

// Re-export main types
pub use codec::DapCodec;
pub use error::CodecError;
pub use message::{
    Event, Message, OutgoingEvent, OutgoingMessage, OutgoingResponse, Request, Response, Seq,
};
pub use reader::DapReader;
pub use transport::{DapTransport, StdioTransport, split};
pub use writer::DapWriter;

use std::io;
use tokio::net::{TcpStream, ToSocketAddrs};

/// Connect to a DAP server over TCP and return a reader/writer pair.
///
/// This is a convenience function for the common case of connecting
/// to a debug adapter listening on a socket (the `tcp` and `server`
/// adapter modes). For `stdio` adapters, build a [`StdioTransport`]
/// from the spawned child's piped stdin/stdout and pass it to [`split`]
/// instead.
///
/// # Example
///
/// ```ignore
/// let (reader, writer) = dap_transport::connect("127.0.0.1:5678").await?;
/// ```
pub async fn connect(
    addr: impl ToSocketAddrs,
) -> io::Result<(
    DapReader<tokio::net::tcp::OwnedReadHalf>,
    DapWriter<tokio::net::tcp::OwnedWriteHalf>,
)> {
    let stream = TcpStream::connect(addr).await?;
    Ok(split(stream))
}
