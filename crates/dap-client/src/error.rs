//! Error types for the dispatcher layer.

use std::time::Duration;

/// Errors that can occur while driving a DAP session.
#[derive(Debug, thiserror::Error)]
pub enum DapError {
    /// The wire framing was corrupted beyond recovery; the connection is
    /// no longer usable. Surfaces to every pending caller as
    /// [`DapError::ClientClosed`] once the reader task tears the session
    /// down.
    #[error("transport framing error: {0}")]
    MalformedFrame(#[source] dap_transport::CodecError),

    /// A frame body was received but couldn't be parsed as a DAP message,
    /// or a response body couldn't be deserialized into the type a
    /// [`crate::DapRequest`] call expected. The frame is logged and
    /// dropped; the connection stays open.
    #[error("failed to decode message body: {0}")]
    DecodeFailure(#[source] serde_json::Error),

    /// Serializing a typed request's arguments to JSON failed.
    #[error("failed to encode request arguments: {0}")]
    EncodeFailure(#[source] serde_json::Error),

    /// No response arrived for a request within its deadline.
    #[error("request {command:?} (seq {seq}) timed out after {timeout:?}")]
    RequestTimeout {
        /// The command that was sent.
        command: String,
        /// The sequence number of the timed-out request.
        seq: i64,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The dispatcher has been closed; no further requests can be sent,
    /// and this reply will never be delivered to a request made before
    /// closing either. Also the terminal state for every pending request
    /// when the adapter process exits out from under a `stdio` session -
    /// the reader task's EOF folds into the same close path, so a dead
    /// adapter process and an explicit `close()` are indistinguishable
    /// to callers.
    #[error("client is closed")]
    ClientClosed,

    /// A `tcp` or `server` mode connection attempt did not complete
    /// within the configured deadline. Raised by the adapter factory,
    /// before any [`Dispatcher`](crate::Dispatcher) exists; carried as
    /// the source of an `eyre::Report` rather than returned bare.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// A `tcp` or `server` mode connection attempt was rejected by the
    /// peer. Same usage as [`DapError::ConnectTimeout`].
    #[error("connection refused: {0}")]
    ConnectRefused(#[source] std::io::Error),

    /// A `stdio` mode adapter process exited. Constructed purely for
    /// logging at the point the reader task observes EOF; the pending
    /// requests themselves still fail with [`DapError::ClientClosed`].
    #[error("adapter process exited with status {0}")]
    AdapterExited(std::process::ExitStatus),

    /// Writing a message to the transport failed, either because encoding
    /// it failed or because the underlying I/O did.
    #[error("failed to write message: {0}")]
    WriteFailure(#[source] dap_transport::CodecError),

    /// A reverse-request handler itself returned an error.
    #[error("reverse request handler for {command:?} failed: {source}")]
    ReverseRequestHandlerError {
        /// The command the failing handler was registered for.
        command: String,
        /// The underlying error.
        #[source]
        source: eyre::Report,
    },

    /// The adapter replied with `success: false`.
    #[error("request {command:?} failed: {message}")]
    RequestFailed {
        /// The command that failed.
        command: String,
        /// The adapter-supplied failure message, if any.
        message: String,
    },

    /// An I/O error occurred on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
