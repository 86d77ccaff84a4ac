//! Typed request/response pairing for the request-invocation facade.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A typed DAP request.
///
/// Implementing this for a request-argument type pins down both the
/// wire command name and the shape of the expected response body, so
/// [`crate::Dispatcher::call`] can serialize the arguments, send the
/// request, and deserialize the response body in one typed call
/// instead of the caller hand-rolling `serde_json::Value` plumbing
/// at every call site.
///
/// # Example
///
/// ```ignore
/// use dap_client::DapRequest;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct Next {
///     #[serde(rename = "threadId")]
///     thread_id: i64,
/// }
///
/// #[derive(Deserialize)]
/// struct NextResponse {}
///
/// impl DapRequest for Next {
///     type Response = NextResponse;
///     const COMMAND: &'static str = "next";
/// }
/// ```
pub trait DapRequest: Serialize {
    /// The shape of a successful response's `body`.
    type Response: DeserializeOwned;

    /// The wire command name, e.g. `"stackTrace"`.
    const COMMAND: &'static str;
}
