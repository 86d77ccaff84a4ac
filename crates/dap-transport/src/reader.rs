//! DAP frame reader.
//!
//! This module provides [`DapReader`], a typed wrapper around a framed
//! async reader that produces a stream of raw DAP frame bodies.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::codec::DapCodec;
use crate::error::CodecError;

pin_project! {
    /// An async stream of incoming DAP frame bodies.
    ///
    /// `DapReader` wraps an [`AsyncRead`] source and unframes DAP messages
    /// from the byte stream, yielding each frame's raw body. It implements
    /// [`Stream`], allowing it to be used with async iteration patterns.
    /// Parsing a body into a typed message is left to the caller (the
    /// dispatcher in `dap-client`), so a body that isn't valid JSON doesn't
    /// have to be a framing-level error.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use futures::StreamExt;
    /// use dap_transport::DapReader;
    ///
    /// let mut reader = DapReader::new(tcp_read_half);
    ///
    /// while let Some(result) = reader.next().await {
    ///     let body = result?;
    ///     // parse body into a Message
    /// }
    /// ```
    pub struct DapReader<R> {
        #[pin]
        inner: FramedRead<R, DapCodec>,
    }
}

impl<R> DapReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Create a new DAP reader from an async read source.
    pub fn new(reader: R) -> Self {
        Self {
            inner: FramedRead::new(reader, DapCodec::new()),
        }
    }

    /// Create a new DAP reader with a custom codec.
    ///
    /// This allows configuring options like maximum message size.
    pub fn with_codec(reader: R, codec: DapCodec) -> Self {
        Self {
            inner: FramedRead::new(reader, codec),
        }
    }

    /// Get a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }

    /// Get a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        self.inner.get_mut()
    }

    /// Consume the reader and return the underlying source.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R> Stream for DapReader<R>
where
    R: AsyncRead + Unpin,
{
    type Item = Result<Bytes, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Cursor;

    fn make_frame(json: &str) -> Vec<u8> {
        format!("Content-Length: {}\r\n\r\n{}", json.len(), json).into_bytes()
    }

    #[tokio::test]
    async fn read_single_message() {
        let json = r#"{"seq":1,"type":"event","event":"initialized"}"#;
        let data = make_frame(json);
        let cursor = Cursor::new(data);

        let mut reader = DapReader::new(cursor);
        let body = reader.next().await.unwrap().unwrap();

        assert_eq!(body, Bytes::from(json));
    }

    #[tokio::test]
    async fn read_multiple_messages() {
        let json1 = r#"{"seq":1,"type":"event","event":"initialized"}"#;
        let json2 =
            r#"{"seq":2,"type":"response","request_seq":1,"success":true,"command":"initialize"}"#;

        let mut data = make_frame(json1);
        data.extend(make_frame(json2));

        let cursor = Cursor::new(data);
        let mut reader = DapReader::new(cursor);

        let body1 = reader.next().await.unwrap().unwrap();
        assert_eq!(body1, Bytes::from(json1));

        let body2 = reader.next().await.unwrap().unwrap();
        assert_eq!(body2, Bytes::from(json2));
    }

    #[tokio::test]
    async fn read_eof() {
        let cursor = Cursor::new(Vec::new());
        let mut reader = DapReader::new(cursor);

        let result = reader.next().await;
        assert!(result.is_none());
    }
}
