//! Typed request/response pairs for a representative slice of DAP commands.
//!
//! These exist to demonstrate (and exercise in tests) the [`DapRequest`]
//! facade; they are not an exhaustive DAP command set. Anything not
//! covered here can still be sent with [`crate::Dispatcher::request_await`]
//! or [`crate::Dispatcher::request_cb`] using a raw `serde_json::Value`.

use serde::{Deserialize, Serialize};

use crate::request::DapRequest;

/// `initialize` request arguments.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Initialize {
    #[serde(rename = "adapterID")]
    pub adapter_id: String,
    pub lines_start_at1: bool,
    pub columns_start_at1: bool,
    pub supports_variable_type: bool,
    pub supports_run_in_terminal_request: bool,
}

/// The subset of `initialize`'s response capabilities callers typically
/// branch on.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub supports_configuration_done_request: Option<bool>,
    pub supports_function_breakpoints: Option<bool>,
    pub supports_conditional_breakpoints: Option<bool>,
    pub supports_terminate_request: Option<bool>,
}

impl DapRequest for Initialize {
    type Response = Capabilities;
    const COMMAND: &'static str = "initialize";
}

/// `launch` request arguments. The adapter-specific fields live under
/// `extra` since DAP intentionally leaves `launch`'s shape to each
/// adapter beyond the handful of fields it standardizes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Launch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    pub stop_on_entry: bool,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LaunchResponse {}

impl DapRequest for Launch {
    type Response = LaunchResponse;
    const COMMAND: &'static str = "launch";
}

/// `setBreakpoints` request arguments.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpoints {
    pub source: Source,
    pub breakpoints: Vec<SourceBreakpoint>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakpoint {
    pub line: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    pub verified: bool,
    pub line: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetBreakpointsResponse {
    pub breakpoints: Vec<Breakpoint>,
}

impl DapRequest for SetBreakpoints {
    type Response = SetBreakpointsResponse;
    const COMMAND: &'static str = "setBreakpoints";
}

/// `stackTrace` request arguments.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTrace {
    pub thread_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_frame: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    pub id: i64,
    pub name: String,
    pub line: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResponse {
    pub stack_frames: Vec<StackFrame>,
}

impl DapRequest for StackTrace {
    type Response = StackTraceResponse;
    const COMMAND: &'static str = "stackTrace";
}

/// `scopes` request arguments.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scopes {
    pub frame_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub name: String,
    pub variables_reference: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopesResponse {
    pub scopes: Vec<Scope>,
}

impl DapRequest for Scopes {
    type Response = ScopesResponse;
    const COMMAND: &'static str = "scopes";
}

/// `variables` request arguments.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variables {
    pub variables_reference: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    pub value: String,
    pub variables_reference: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablesResponse {
    pub variables: Vec<Variable>,
}

impl DapRequest for Variables {
    type Response = VariablesResponse;
    const COMMAND: &'static str = "variables";
}

/// `continue` request arguments.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Continue {
    pub thread_id: i64,
    pub single_thread: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContinueResponse {
    pub all_threads_continued: Option<bool>,
}

impl DapRequest for Continue {
    type Response = ContinueResponse;
    const COMMAND: &'static str = "continue";
}

/// `evaluate` request arguments.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluate {
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub result: String,
    pub variables_reference: i64,
}

impl DapRequest for Evaluate {
    type Response = EvaluateResponse;
    const COMMAND: &'static str = "evaluate";
}

/// `disconnect` request arguments.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Disconnect {
    pub terminate_debuggee: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DisconnectResponse {}

impl DapRequest for Disconnect {
    type Response = DisconnectResponse;
    const COMMAND: &'static str = "disconnect";
}
