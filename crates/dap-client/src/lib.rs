//! Request/response dispatching for the Debug Adapter Protocol.
//!
//! Where `dap-transport` only knows how to frame and unframe bytes on
//! the wire, this crate knows what a DAP *session* looks like: sequence
//! numbers, matching a response back to the request that triggered it,
//! routing events to subscribers, and answering (or rejecting) reverse
//! requests from the adapter.
//!
//! The entry point is [`Dispatcher::spawn`], which takes a
//! [`dap_transport::DapReader`]/[`dap_transport::DapWriter`] pair (from
//! any transport - TCP, stdio, or [`dap_transport::testing::MemoryTransport`]
//! in tests) and returns a live [`Dispatcher`] handle.
//!
//! ```ignore
//! use dap_client::{Dispatcher, DispatcherConfig};
//! use dap_transport::split;
//!
//! let (reader, writer) = dap_transport::connect("127.0.0.1:5678").await?;
//! let dispatcher = Dispatcher::spawn(reader, writer, DispatcherConfig::default());
//!
//! dispatcher.on("stopped", |event| {
//!     tracing::info!(?event, "adapter stopped");
//! }).await;
//!
//! let caps = dispatcher.call(dap_client::commands::Initialize {
//!     adapter_id: "my-adapter".to_string(),
//!     lines_start_at1: true,
//!     columns_start_at1: true,
//!     supports_variable_type: true,
//!     supports_run_in_terminal_request: false,
//! }).await?;
//! ```

mod dispatcher;
mod error;
mod pending;
mod request;

pub mod commands;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::DapError;
pub use request::DapRequest;

pub use dap_transport::{Event, Message, Request, Response, Seq};

#[cfg(test)]
mod tests {
    use super::*;
    use dap_transport::testing::MemoryTransport;
    use dap_transport::{Message, OutgoingEvent, OutgoingMessage, OutgoingResponse, split};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn init_test_logging() {
        static INIT: std::sync::Once = std::sync::Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init();
            let _ = color_eyre::install();
        });
    }

    fn spawn_session() -> (Dispatcher<tokio::io::DuplexStream>, dap_transport::DapReader<tokio::io::DuplexStream>, dap_transport::DapWriter<tokio::io::DuplexStream>) {
        init_test_logging();
        let (client, adapter) = MemoryTransport::pair();
        let (client_reader, client_writer) = split(client);
        let (adapter_reader, adapter_writer) = split(adapter);

        let dispatcher = Dispatcher::spawn(client_reader, client_writer, DispatcherConfig::default());
        (dispatcher, adapter_reader, adapter_writer)
    }

    #[tokio::test]
    async fn happy_path_request_response() {
        let (dispatcher, mut adapter_reader, mut adapter_writer) = spawn_session();

        let responder = tokio::spawn(async move {
            use futures::StreamExt;
            let body = adapter_reader.next().await.unwrap().unwrap();
            let msg: Message = serde_json::from_slice(&body).unwrap();
            let Message::Request(req) = msg else {
                panic!("expected request");
            };
            adapter_writer
                .send(OutgoingMessage::Response(OutgoingResponse {
                    seq: 100,
                    request_seq: req.seq,
                    success: true,
                    command: req.command,
                    message: None,
                    body: Some(serde_json::json!({"ok": true})),
                }))
                .await
                .unwrap();
        });

        let response = dispatcher
            .request_await("initialize", Some(serde_json::json!({})))
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.body.unwrap()["ok"], true);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn error_response_resolves_to_request_failed() {
        let (dispatcher, mut adapter_reader, mut adapter_writer) = spawn_session();

        tokio::spawn(async move {
            use futures::StreamExt;
            let body = adapter_reader.next().await.unwrap().unwrap();
            let msg: Message = serde_json::from_slice(&body).unwrap();
            let Message::Request(req) = msg else {
                panic!("expected request");
            };
            adapter_writer
                .send(OutgoingMessage::Response(OutgoingResponse {
                    seq: 101,
                    request_seq: req.seq,
                    success: false,
                    command: req.command,
                    message: Some("breakpoint not valid".to_string()),
                    body: None,
                }))
                .await
                .unwrap();
        });

        let result = dispatcher.request_await("next", None).await;
        match result {
            Err(DapError::RequestFailed { command, message }) => {
                assert_eq!(command, "next");
                assert_eq!(message, "breakpoint not valid");
            }
            other => panic!("expected RequestFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_then_late_reply_does_not_leak() {
        let (dispatcher, mut adapter_reader, mut adapter_writer) = spawn_session();

        let result = dispatcher
            .request_await_timeout("stackTrace", None, Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(DapError::RequestTimeout { .. })));

        // A reply that shows up after the timeout must be silently
        // dropped rather than delivered to anyone or causing a panic.
        use futures::StreamExt;
        let body = adapter_reader.next().await.unwrap().unwrap();
        let msg: Message = serde_json::from_slice(&body).unwrap();
        let Message::Request(req) = msg else {
            panic!("expected request");
        };
        adapter_writer
            .send(OutgoingMessage::Response(OutgoingResponse {
                seq: 102,
                request_seq: req.seq,
                success: true,
                command: req.command,
                message: None,
                body: None,
            }))
            .await
            .unwrap();

        // Give the processor task a chance to handle (and discard) it.
        tokio::time::sleep(Duration::from_millis(20)).await;
        dispatcher.close().await;
    }

    #[tokio::test]
    async fn unhandled_reverse_request_gets_unsupported_reply() {
        let (dispatcher, mut adapter_reader, mut adapter_writer) = spawn_session();

        adapter_writer
            .send(OutgoingMessage::Request(dap_transport::Request {
                seq: 1,
                command: "runInTerminal".to_string(),
                arguments: None,
            }))
            .await
            .unwrap();

        use futures::StreamExt;
        let body = adapter_reader.next().await.unwrap().unwrap();
        let msg: Message = serde_json::from_slice(&body).unwrap();
        let Message::Response(response) = msg else {
            panic!("expected response");
        };

        assert!(!response.success);
        assert_eq!(response.message.unwrap(), "unsupported command");
        dispatcher.close().await;
    }

    #[tokio::test]
    async fn reverse_request_with_handler_replies_with_body() {
        let (dispatcher, mut adapter_reader, mut adapter_writer) = spawn_session();

        dispatcher
            .on_request("runInTerminal", |_req| async move {
                Ok(serde_json::json!({"processId": 4242}))
            })
            .await;

        adapter_writer
            .send(OutgoingMessage::Request(dap_transport::Request {
                seq: 1,
                command: "runInTerminal".to_string(),
                arguments: None,
            }))
            .await
            .unwrap();

        use futures::StreamExt;
        let body = adapter_reader.next().await.unwrap().unwrap();
        let msg: Message = serde_json::from_slice(&body).unwrap();
        let Message::Response(response) = msg else {
            panic!("expected response");
        };

        assert!(response.success);
        assert_eq!(response.body.unwrap()["processId"], 4242);
        dispatcher.close().await;
    }

    #[tokio::test]
    async fn event_handler_is_invoked() {
        let (dispatcher, _adapter_reader, mut adapter_writer) = spawn_session();

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        dispatcher
            .on("stopped", move |_event| {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        adapter_writer
            .send(OutgoingMessage::Event(OutgoingEvent {
                seq: 1,
                event: "stopped".to_string(),
                body: None,
            }))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        dispatcher.close().await;
    }

    #[tokio::test]
    async fn second_event_handler_registration_replaces_first() {
        let (dispatcher, _adapter_reader, mut adapter_writer) = spawn_session();

        let first_seen = Arc::new(AtomicUsize::new(0));
        let second_seen = Arc::new(AtomicUsize::new(0));

        let first_clone = Arc::clone(&first_seen);
        dispatcher
            .on("stopped", move |_event| {
                first_clone.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        let second_clone = Arc::clone(&second_seen);
        dispatcher
            .on("stopped", move |_event| {
                second_clone.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        adapter_writer
            .send(OutgoingMessage::Event(OutgoingEvent {
                seq: 1,
                event: "stopped".to_string(),
                body: None,
            }))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(first_seen.load(Ordering::SeqCst), 0);
        assert_eq!(second_seen.load(Ordering::SeqCst), 1);
        dispatcher.close().await;
    }

    #[tokio::test]
    async fn close_releases_pending_waiters() {
        let (dispatcher, _adapter_reader, _adapter_writer) = spawn_session();

        let dispatcher_clone = dispatcher.clone();
        let waiter = tokio::spawn(async move {
            dispatcher_clone
                .request_await_timeout("threads", None, Duration::from_secs(5))
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        dispatcher.close().await;

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(DapError::ClientClosed)));
    }

    #[tokio::test]
    async fn is_closing_reflects_state() {
        let (dispatcher, _adapter_reader, _adapter_writer) = spawn_session();
        assert!(!dispatcher.is_closing());
        dispatcher.close().await;
        assert!(dispatcher.is_closing());
    }

    #[tokio::test]
    async fn seq_numbers_are_monotonic() {
        let (dispatcher, mut adapter_reader, mut adapter_writer) = spawn_session();

        let responder = tokio::spawn(async move {
            use futures::StreamExt;
            let mut seqs = Vec::new();
            for _ in 0..3 {
                let body = adapter_reader.next().await.unwrap().unwrap();
                let msg: Message = serde_json::from_slice(&body).unwrap();
                let Message::Request(req) = msg else {
                    panic!("expected request");
                };
                seqs.push(req.seq);
                adapter_writer
                    .send(OutgoingMessage::Response(OutgoingResponse {
                        seq: req.seq + 1000,
                        request_seq: req.seq,
                        success: true,
                        command: req.command,
                        message: None,
                        body: None,
                    }))
                    .await
                    .unwrap();
            }
            seqs
        });

        for _ in 0..3 {
            dispatcher.request_await("noop", None).await.unwrap();
        }

        let seqs = responder.await.unwrap();
        assert!(seqs.windows(2).all(|w| w[1] > w[0]));
    }

    #[tokio::test]
    async fn typed_call_deserializes_response_body() {
        let (dispatcher, mut adapter_reader, mut adapter_writer) = spawn_session();

        tokio::spawn(async move {
            use futures::StreamExt;
            let body = adapter_reader.next().await.unwrap().unwrap();
            let msg: Message = serde_json::from_slice(&body).unwrap();
            let Message::Request(req) = msg else {
                panic!("expected request");
            };
            assert_eq!(req.command, "initialize");
            adapter_writer
                .send(OutgoingMessage::Response(OutgoingResponse {
                    seq: 300,
                    request_seq: req.seq,
                    success: true,
                    command: req.command,
                    message: None,
                    body: Some(serde_json::json!({
                        "supportsConfigurationDoneRequest": true,
                    })),
                }))
                .await
                .unwrap();
        });

        let caps = dispatcher
            .call(commands::Initialize {
                adapter_id: "test".to_string(),
                lines_start_at1: true,
                columns_start_at1: true,
                supports_variable_type: false,
                supports_run_in_terminal_request: false,
            })
            .await
            .unwrap();

        assert_eq!(caps.supports_configuration_done_request, Some(true));
    }

    #[tokio::test]
    async fn typed_call_maps_failure_response_to_request_failed() {
        let (dispatcher, mut adapter_reader, mut adapter_writer) = spawn_session();

        tokio::spawn(async move {
            use futures::StreamExt;
            let body = adapter_reader.next().await.unwrap().unwrap();
            let msg: Message = serde_json::from_slice(&body).unwrap();
            let Message::Request(req) = msg else {
                panic!("expected request");
            };
            adapter_writer
                .send(OutgoingMessage::Response(OutgoingResponse {
                    seq: 301,
                    request_seq: req.seq,
                    success: false,
                    command: req.command,
                    message: Some("no such thread".to_string()),
                    body: None,
                }))
                .await
                .unwrap();
        });

        let result = dispatcher
            .call(commands::Continue {
                thread_id: 1,
                single_thread: true,
            })
            .await;

        assert!(matches!(result, Err(DapError::RequestFailed { .. })));
    }

    #[tokio::test]
    async fn request_cb_delivers_result_without_blocking_caller() {
        let (dispatcher, mut adapter_reader, mut adapter_writer) = spawn_session();

        tokio::spawn(async move {
            use futures::StreamExt;
            let body = adapter_reader.next().await.unwrap().unwrap();
            let msg: Message = serde_json::from_slice(&body).unwrap();
            let Message::Request(req) = msg else {
                panic!("expected request");
            };
            adapter_writer
                .send(OutgoingMessage::Response(OutgoingResponse {
                    seq: 200,
                    request_seq: req.seq,
                    success: true,
                    command: req.command,
                    message: None,
                    body: None,
                }))
                .await
                .unwrap();
        });

        let (tx, rx) = tokio::sync::oneshot::channel();
        dispatcher.request_cb("pause", None, move |result| {
            let _ = tx.send(result);
        });

        let result = rx.await.unwrap();
        assert!(result.unwrap().success);
    }
}
