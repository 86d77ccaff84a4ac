//! Tracking in-flight requests and matching responses to them.

use std::collections::HashMap;

use dap_transport::{Response, Seq};
use tokio::sync::oneshot;

/// Tracker for requests awaiting a response.
///
/// A request is added when it's sent and removed either when its
/// response arrives (by `request_seq`) or when the dispatcher closes,
/// at which point every outstanding entry is dropped so its waiter
/// observes a closed channel rather than hanging forever.
pub(crate) struct PendingRequests {
    pending: HashMap<Seq, oneshot::Sender<Response>>,
}

impl PendingRequests {
    pub(crate) fn new() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }

    /// Register `seq` as awaiting a response, returning the receiver half.
    pub(crate) fn add(&mut self, seq: Seq) -> oneshot::Receiver<Response> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(seq, tx);
        rx
    }

    /// Forget `seq` without delivering anything (used on timeout, so a
    /// response that arrives after the fact is silently dropped instead
    /// of leaking the table entry).
    pub(crate) fn remove(&mut self, seq: Seq) {
        self.pending.remove(&seq);
    }

    /// Route a response to its waiter, if one is still registered.
    ///
    /// Returns `true` if a waiter was found. A `false` return (a response
    /// for a `request_seq` nobody is waiting on, typically because the
    /// request already timed out) is not an error; the caller should log
    /// and move on.
    pub(crate) fn handle_response(&mut self, response: Response) -> bool {
        if let Some(tx) = self.pending.remove(&response.request_seq) {
            let _ = tx.send(response);
            true
        } else {
            false
        }
    }

    /// Drain every pending entry, dropping the sender half so each
    /// waiter observes `RecvError` (translated by the caller to
    /// [`crate::DapError::ClientClosed`]).
    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}
