//! The request/response dispatcher: sequencing, correlation, timeouts,
//! and event/reverse-request routing over a framed DAP transport.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use dap_transport::{DapReader, DapWriter, Event, Message, OutgoingMessage, OutgoingResponse, Request, Response, Seq};
use futures::StreamExt;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::DapError;
use crate::pending::PendingRequests;
use crate::request::DapRequest;

/// Default deadline for a request awaiting its response.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How long [`Dispatcher::request_await`] (and `request_cb`) wait for
    /// a response before giving up, unless overridden per call with the
    /// `_timeout` variants.
    pub request_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

type EventHandler = Box<dyn Fn(Event) + Send + Sync>;
type ReverseFuture = Pin<Box<dyn Future<Output = eyre::Result<Value>> + Send>>;
type ReverseHandler = Box<dyn Fn(Request) -> ReverseFuture + Send + Sync>;

struct Internals<W> {
    writer: Mutex<DapWriter<W>>,
    sequence_number: AtomicI64,
    pending: Mutex<PendingRequests>,
    event_handlers: Mutex<HashMap<String, EventHandler>>,
    reverse_handlers: Mutex<HashMap<String, ReverseHandler>>,
    cancel_token: CancellationToken,
    closing: AtomicBool,
    default_timeout: Duration,
}

impl<W> Internals<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn next_seq(&self) -> Seq {
        self.sequence_number.fetch_add(1, Ordering::SeqCst)
    }

    /// Mark the session closed and release every pending waiter. Safe to
    /// call more than once (from the reader task on EOF/error *and* from
    /// an explicit [`Dispatcher::close`]).
    async fn begin_close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.pending.lock().await.clear();
        self.cancel_token.cancel();
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// The coroutine shared by both `request_await` and `request_cb`:
    /// allocate a sequence number, send the request, and race the reply
    /// against `timeout`.
    async fn send_and_wait(
        self: &Arc<Self>,
        command: String,
        arguments: Option<Value>,
        timeout: Duration,
    ) -> Result<Response, DapError> {
        if self.is_closing() {
            return Err(DapError::ClientClosed);
        }

        let seq = self.next_seq();
        let rx = self.pending.lock().await.add(seq);

        let msg = OutgoingMessage::Request(Request {
            seq,
            command: command.clone(),
            arguments,
        });

        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = futures::SinkExt::send(&mut *writer, msg).await {
                self.pending.lock().await.remove(seq);
                return Err(DapError::WriteFailure(e));
            }
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) if response.success => Ok(response),
            Ok(Ok(response)) => Err(DapError::RequestFailed {
                command,
                message: response.message.unwrap_or_else(|| "Error".to_string()),
            }),
            Ok(Err(_)) => Err(DapError::ClientClosed),
            Err(_) => {
                self.pending.lock().await.remove(seq);
                Err(DapError::RequestTimeout {
                    command,
                    seq,
                    timeout,
                })
            }
        }
    }

    async fn send_outgoing_response(&self, response: OutgoingResponse) {
        let mut writer = self.writer.lock().await;
        if let Err(e) = futures::SinkExt::send(&mut *writer, OutgoingMessage::Response(response)).await {
            tracing::error!(error = %e, "failed to send reverse-request reply");
        }
    }

    async fn handle_response(&self, response: Response) {
        if !self.pending.lock().await.handle_response(response.clone()) {
            tracing::debug!(
                request_seq = response.request_seq,
                "response for unknown or already-timed-out request"
            );
        }
    }

    async fn handle_event(&self, event: Event) {
        let handlers = self.event_handlers.lock().await;
        if let Some(callback) = handlers.get(&event.event) {
            callback(event);
        }
    }

    /// Handle a reverse request from the adapter. If no handler is
    /// registered, reply with `success: false` rather than dropping the
    /// request silently.
    async fn handle_reverse_request(self: Arc<Self>, request: Request) {
        let handler = {
            let handlers = self.reverse_handlers.lock().await;
            handlers.get(&request.command).map(|_| ())
        };

        let seq = self.next_seq();

        if handler.is_none() {
            tracing::warn!(command = %request.command, "unsupported reverse request");
            self.send_outgoing_response(OutgoingResponse {
                seq,
                request_seq: request.seq,
                success: false,
                command: request.command,
                message: Some("unsupported command".to_string()),
                body: None,
            })
            .await;
            return;
        }

        let future = {
            let handlers = self.reverse_handlers.lock().await;
            // Present because of the check above; the table is
            // append-only for the lifetime of the dispatcher.
            (handlers.get(&request.command).unwrap())(request.clone())
        };

        match future.await {
            Ok(body) => {
                self.send_outgoing_response(OutgoingResponse {
                    seq,
                    request_seq: request.seq,
                    success: true,
                    command: request.command,
                    message: None,
                    body: Some(body),
                })
                .await;
            }
            Err(source) => {
                let err = DapError::ReverseRequestHandlerError {
                    command: request.command.clone(),
                    source,
                };
                tracing::error!(error = %err, "reverse request handler failed");
                self.send_outgoing_response(OutgoingResponse {
                    seq,
                    request_seq: request.seq,
                    success: false,
                    command: request.command,
                    message: Some(err.to_string()),
                    body: None,
                })
                .await;
            }
        }
    }
}

/// A live DAP session: owns the framed transport and drives the
/// request/response/event protocol on top of it.
///
/// Cloning a `Dispatcher` is cheap (it's a handle around a shared
/// `Arc`); every clone talks to the same reader/processor tasks and the
/// same pending-request table.
pub struct Dispatcher<W> {
    internals: Arc<Internals<W>>,
    reader_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    processor_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<W> Clone for Dispatcher<W> {
    fn clone(&self) -> Self {
        Self {
            internals: Arc::clone(&self.internals),
            reader_handle: Arc::clone(&self.reader_handle),
            processor_handle: Arc::clone(&self.processor_handle),
        }
    }
}

impl<W> Dispatcher<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Wire a reader/writer pair into a running dispatcher: spawns the
    /// reader task (frame bytes off the wire) and the processor task
    /// (parse frames, route responses/events/reverse-requests).
    pub fn spawn<R>(reader: DapReader<R>, writer: DapWriter<W>, config: DispatcherConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let internals = Arc::new(Internals {
            writer: Mutex::new(writer),
            sequence_number: AtomicI64::new(1),
            pending: Mutex::new(PendingRequests::new()),
            event_handlers: Mutex::new(HashMap::new()),
            reverse_handlers: Mutex::new(HashMap::new()),
            cancel_token: CancellationToken::new(),
            closing: AtomicBool::new(false),
            default_timeout: config.request_timeout,
        });

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();

        let reader_handle = Self::spawn_reader_task(reader, raw_tx, internals.cancel_token.clone());
        let processor_handle =
            Self::spawn_processor_task(raw_rx, Arc::clone(&internals), internals.cancel_token.clone());

        Self {
            internals,
            reader_handle: Arc::new(Mutex::new(Some(reader_handle))),
            processor_handle: Arc::new(Mutex::new(Some(processor_handle))),
        }
    }

    fn spawn_reader_task<R>(
        mut reader: DapReader<R>,
        raw_tx: mpsc::UnboundedSender<bytes::Bytes>,
        cancel: CancellationToken,
    ) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("reader task cancelled");
                        break;
                    }
                    frame = reader.next() => {
                        match frame {
                            Some(Ok(body)) => {
                                if raw_tx.send(body).is_err() {
                                    tracing::debug!("processor channel closed");
                                    break;
                                }
                            }
                            Some(Err(e)) => {
                                let err = DapError::MalformedFrame(e);
                                tracing::error!(error = %err, "transport framing error, closing session");
                                break;
                            }
                            None => {
                                tracing::debug!("transport closed by peer");
                                break;
                            }
                        }
                    }
                }
            }
            cancel.cancel();
        })
    }

    fn spawn_processor_task(
        mut raw_rx: mpsc::UnboundedReceiver<bytes::Bytes>,
        internals: Arc<Internals<W>>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        break;
                    }
                    frame = raw_rx.recv() => {
                        let Some(body) = frame else {
                            break;
                        };

                        match serde_json::from_slice::<Message>(&body) {
                            Ok(Message::Response(response)) => {
                                internals.handle_response(response).await;
                            }
                            Ok(Message::Event(event)) => {
                                internals.handle_event(event).await;
                            }
                            Ok(Message::Request(request)) => {
                                tokio::spawn(Arc::clone(&internals).handle_reverse_request(request));
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "dropping malformed frame body");
                            }
                        }
                    }
                }
            }
            internals.begin_close().await;
        })
    }

    /// Register a handler invoked whenever an event named `event` arrives.
    /// Only one handler may be registered per event name; registering a
    /// second replaces the first, the same as [`on_request`](Self::on_request).
    pub async fn on(&self, event: impl Into<String>, handler: impl Fn(Event) + Send + Sync + 'static) {
        let mut handlers = self.internals.event_handlers.lock().await;
        handlers.insert(event.into(), Box::new(handler));
    }

    /// Register a handler for reverse requests named `command`. Only one
    /// handler may be registered per command; registering a second
    /// replaces the first. Commands with no registered handler are
    /// answered with `success: false, message: "unsupported command"`
    /// rather than dropped.
    pub async fn on_request<F, Fut>(&self, command: impl Into<String>, handler: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<Value>> + Send + 'static,
    {
        let mut handlers = self.internals.reverse_handlers.lock().await;
        handlers.insert(command.into(), Box::new(move |req| Box::pin(handler(req))));
    }

    /// Send a request and await its response using the dispatcher's
    /// default timeout.
    ///
    /// Resolves to `Err(`[`DapError::RequestFailed`]`)` if the adapter
    /// replies with `success: false`; the `Ok` response is always a
    /// successful one.
    pub async fn request_await(
        &self,
        command: impl Into<String>,
        arguments: Option<Value>,
    ) -> Result<Response, DapError> {
        let timeout = self.internals.default_timeout;
        self.request_await_timeout(command, arguments, timeout).await
    }

    /// Send a request and await its response, overriding the default
    /// timeout for this call only. See [`request_await`](Self::request_await)
    /// for the `success: false` behavior.
    pub async fn request_await_timeout(
        &self,
        command: impl Into<String>,
        arguments: Option<Value>,
        timeout: Duration,
    ) -> Result<Response, DapError> {
        self.internals
            .send_and_wait(command.into(), arguments, timeout)
            .await
    }

    /// Send a request and invoke `callback` with the result once it
    /// arrives, without blocking the caller. Shares the same
    /// [`send_and_wait`](Internals::send_and_wait) coroutine that
    /// `request_await` uses; the two entry points differ only in
    /// whether the caller awaits the future directly or hands it to a
    /// spawned task.
    pub fn request_cb<F>(&self, command: impl Into<String>, arguments: Option<Value>, callback: F)
    where
        F: FnOnce(Result<Response, DapError>) + Send + 'static,
    {
        let internals = Arc::clone(&self.internals);
        let command = command.into();
        let timeout = internals.default_timeout;
        tokio::spawn(async move {
            let result = internals.send_and_wait(command, arguments, timeout).await;
            callback(result);
        });
    }

    /// Send a typed request and deserialize its response body.
    ///
    /// Returns [`DapError::RequestFailed`] if the adapter replied with
    /// `success: false`.
    pub async fn call<Req: DapRequest>(&self, request: Req) -> Result<Req::Response, DapError> {
        let arguments = serde_json::to_value(&request).map_err(DapError::EncodeFailure)?;
        let arguments = if arguments.is_null() { None } else { Some(arguments) };

        let response = self.request_await(Req::COMMAND, arguments).await?;

        let body = response.body.unwrap_or(Value::Null);
        serde_json::from_value(body).map_err(DapError::DecodeFailure)
    }

    /// Whether the session has been closed, either explicitly or because
    /// the transport went away.
    pub fn is_closing(&self) -> bool {
        self.internals.is_closing()
    }

    /// Close the session: cancel the reader/processor tasks, release
    /// every pending waiter with [`DapError::ClientClosed`], and wait for
    /// both tasks to finish. Idempotent - calling this more than once
    /// (or after the transport closed on its own) is a no-op past the
    /// first call.
    pub async fn close(&self) {
        self.internals.begin_close().await;

        if let Some(handle) = self.reader_handle.lock().await.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.processor_handle.lock().await.take() {
            let _ = handle.await;
        }
    }
}
