//! Spawning and connecting to debug adapter processes.
//!
//! A debug adapter can be reached three ways:
//!
//! - `stdio`: spawn the adapter binary and speak DAP directly over its
//!   piped stdin/stdout.
//! - `tcp`: the adapter is already listening somewhere; just connect.
//! - `server`: spawn a helper process that itself listens on TCP, wait
//!   for it to print something indicating it's ready (and, usually,
//!   which port it picked), then connect. Unlike `tcp`, the helper's
//!   lifecycle (including graceful shutdown) is this crate's job.
//!
//! [`AdapterDescriptor::connect`] hides these differences behind one
//! async call returning a [`dap_client::Dispatcher`] plus an
//! [`AdapterProcess`] handle for whatever process lifecycle that mode
//! entails (none, for `tcp`).
//!
//! `server` mode descriptors are meant to be shared: several debuggee
//! sessions connecting to "the same" helper should get one spawned
//! process, not one each. [`AdapterDescriptor::connect`] alone can't do
//! that - it owns no state between calls - so use [`AdapterFactory`]
//! whenever a `server` descriptor might be connected to more than once.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use eyre::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::watch;

use dap_client::{Dispatcher, DispatcherConfig};
use dap_transport::{DapReader, DapWriter};

/// Grace period between SIGTERM and SIGKILL when shutting a spawned
/// adapter process down.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;
type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// A [`Dispatcher`] wired up to an adapter reached through any of the
/// three connection modes.
pub type AdapterDispatcher = Dispatcher<BoxedWriter>;

/// Tunables for establishing a connection to an adapter, as opposed to
/// [`DispatcherConfig`] which governs the session once established.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Deadline for a `tcp` or `server` mode TCP connection attempt.
    pub connect_timeout: Duration,
    /// Deadline for a `server` mode helper to announce the port it's
    /// listening on via `connect_condition`.
    pub server_port_detect_timeout: Duration,
    /// Maximum frame body size accepted from the adapter.
    pub max_message_size: usize,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            server_port_detect_timeout: Duration::from_secs(5),
            max_message_size: 16 * 1024 * 1024,
        }
    }
}

fn box_halves<R, W>(
    read: R,
    write: W,
    max_message_size: usize,
) -> (DapReader<BoxedReader>, DapWriter<BoxedWriter>)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    (
        DapReader::with_codec(
            Box::new(read) as BoxedReader,
            dap_transport::DapCodec::with_max_size(max_message_size),
        ),
        DapWriter::with_codec(
            Box::new(write) as BoxedWriter,
            dap_transport::DapCodec::with_max_size(max_message_size),
        ),
    )
}

/// A predicate applied to each line of a spawned helper's stdout,
/// returning the port it's listening on once readiness is detected.
pub type ConnectCondition = Arc<dyn Fn(&str) -> Option<u16> + Send + Sync>;

/// Describes how to reach a debug adapter.
#[derive(Clone)]
pub enum AdapterDescriptor {
    /// Spawn `command` and speak DAP over its piped stdin/stdout.
    Stdio {
        command: String,
        args: Vec<String>,
    },
    /// Connect directly to an adapter already listening at `host:port`.
    Tcp { host: String, port: u16 },
    /// Spawn `command` and wait for a line of its stdout to satisfy
    /// `connect_condition`, treating the first `Some(port)` it returns
    /// as where to connect.
    Server {
        command: String,
        args: Vec<String>,
        connect_condition: ConnectCondition,
    },
}

/// Owns whatever process lifecycle a connection mode entails.
///
/// Dropping this (without calling [`shutdown`](Self::shutdown) first)
/// still terminates an owned or last-referenced shared process - this
/// is a fallback, not the primary path, since it can't wait for the
/// graceful SIGTERM grace period to elapse.
pub enum AdapterProcess {
    /// `tcp` mode: nothing to manage.
    None,
    /// `stdio` mode: this connection is the sole owner of the child.
    Owned(OwnedProcess),
    /// `server` mode: one reference into a process potentially shared
    /// with other connections.
    Shared(ServerConnection),
}

impl AdapterProcess {
    /// Terminate the process gracefully: SIGTERM, then SIGKILL if it
    /// hasn't exited within the grace period. A no-op for `None` and
    /// for `Shared` handles that aren't the last reference.
    pub async fn shutdown(self) -> eyre::Result<()> {
        match self {
            AdapterProcess::None => Ok(()),
            AdapterProcess::Owned(mut proc) => terminate_gracefully(&mut proc).await,
            AdapterProcess::Shared(conn) => conn.shutdown().await,
        }
    }
}

/// A spawned adapter process, watched by a background task so an
/// unexpected exit is logged (see [`DapError::AdapterExited`]) even if
/// nobody calls [`AdapterProcess::shutdown`]. Termination is done by
/// signaling the recorded pid directly, since the [`Child`] handle
/// itself is owned by the monitor task's `wait()` call.
///
/// [`DapError::AdapterExited`]: dap_client::DapError::AdapterExited
pub struct OwnedProcess {
    pid: Option<i32>,
    exit_rx: watch::Receiver<Option<std::process::ExitStatus>>,
}

/// Take ownership of `child`, spawning a task that waits for it to exit
/// and logs the outcome - `warn` for a non-zero exit, `debug` for a
/// clean one - via [`DapError::AdapterExited`](dap_client::DapError::AdapterExited).
/// Take any stdio handles off `child` before calling this; once called,
/// nothing but this module's helpers may touch the child again.
fn monitor_child(mut child: Child) -> OwnedProcess {
    let pid = child.id().map(|id| id as i32);
    let (exit_tx, exit_rx) = watch::channel(None);

    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) if status.success() => {
                tracing::debug!(?status, "adapter process exited");
                let _ = exit_tx.send(Some(status));
            }
            Ok(status) => {
                tracing::warn!(
                    error = %dap_client::DapError::AdapterExited(status),
                    "adapter process exited"
                );
                let _ = exit_tx.send(Some(status));
            }
            Err(e) => tracing::warn!(error = %e, "failed to wait on adapter process"),
        }
    });

    OwnedProcess { pid, exit_rx }
}

/// Send SIGTERM, give the process [`SHUTDOWN_GRACE_PERIOD`] to exit on
/// its own, and SIGKILL it if it hasn't.
async fn terminate_gracefully(proc: &mut OwnedProcess) -> eyre::Result<()> {
    if proc.exit_rx.borrow().is_some() {
        return Ok(());
    }
    let Some(pid) = proc.pid else {
        return Ok(());
    };
    let pid = nix::unistd::Pid::from_raw(pid);

    if let Err(e) = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM) {
        tracing::warn!(error = %e, "SIGTERM failed, process may already be gone");
    }

    let wait_for_exit = async {
        while proc.exit_rx.borrow().is_none() {
            if proc.exit_rx.changed().await.is_err() {
                break;
            }
        }
    };

    if tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, wait_for_exit)
        .await
        .is_err()
    {
        tracing::warn!("adapter process did not exit after SIGTERM, sending SIGKILL");
        nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL)
            .context("sending SIGKILL")?;

        let wait_for_kill = async {
            while proc.exit_rx.borrow().is_none() {
                if proc.exit_rx.changed().await.is_err() {
                    break;
                }
            }
        };
        let _ = tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, wait_for_kill).await;
    }

    Ok(())
}

/// Read a spawned helper's stdout line by line until `connect_condition`
/// returns a port, collecting everything seen for diagnostics if it
/// times out or the process exits first.
async fn wait_for_port(
    child: &mut Child,
    connect_condition: &ConnectCondition,
    timeout: Duration,
) -> eyre::Result<u16> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| eyre::eyre!("child stdout was not piped"))?;
    let mut lines = BufReader::new(stdout).lines();
    let mut collected = Vec::new();

    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            let exit_info = match child.try_wait() {
                Ok(Some(status)) => format!(" (process exited with status: {status})"),
                Ok(None) => " (process still running)".to_string(),
                Err(e) => format!(" (could not check process status: {e})"),
            };
            eyre::bail!(
                "timed out after {timeout:?} waiting for adapter readiness{exit_info}\ncollected output:\n{}",
                collected.join("\n")
            );
        }

        let line = match tokio::time::timeout(remaining, lines.next_line()).await {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => {
                eyre::bail!(
                    "adapter process closed stdout before announcing readiness\ncollected output:\n{}",
                    collected.join("\n")
                );
            }
            Ok(Err(e)) => {
                return Err(e)
                    .context("reading adapter stdout")
                    .with_context(|| format!("collected output:\n{}", collected.join("\n")));
            }
            Err(_) => continue, // loop back around to hit the deadline check above
        };

        if let Some(port) = connect_condition(&line) {
            return Ok(port);
        }
        collected.push(line);
    }
}

impl AdapterDescriptor {
    /// Connect to the described adapter, spawning a process first if
    /// the mode requires it, and return a running dispatcher plus its
    /// process handle.
    ///
    /// For `server` mode this always spawns its own helper - it shares
    /// nothing with any other call, including one made with an
    /// identical descriptor. Go through [`AdapterFactory::connect`] when
    /// that descriptor might be connected to concurrently or repeatedly
    /// and should reuse one helper process.
    pub async fn connect(
        self,
        dispatcher_config: DispatcherConfig,
        connect_config: ConnectConfig,
    ) -> eyre::Result<(AdapterDispatcher, AdapterProcess)> {
        match self {
            AdapterDescriptor::Stdio { command, args } => {
                which::which(&command)
                    .with_context(|| format!("{command} not found in PATH"))?;

                let mut child = Command::new(&command)
                    .args(&args)
                    .stdin(Stdio::piped())
                    .stdout(Stdio::piped())
                    .spawn()
                    .with_context(|| format!("spawning {command}"))?;

                let stdin = child
                    .stdin
                    .take()
                    .ok_or_else(|| eyre::eyre!("child stdin was not piped"))?;
                let stdout = child
                    .stdout
                    .take()
                    .ok_or_else(|| eyre::eyre!("child stdout was not piped"))?;
                let (reader, writer) = box_halves(stdout, stdin, connect_config.max_message_size);
                let dispatcher = Dispatcher::spawn(reader, writer, dispatcher_config);

                Ok((dispatcher, AdapterProcess::Owned(monitor_child(child))))
            }
            AdapterDescriptor::Tcp { host, port } => {
                let stream = connect_tcp(&host, port, connect_config.connect_timeout).await?;
                let (read, write) = stream.into_split();
                let (reader, writer) = box_halves(read, write, connect_config.max_message_size);
                let dispatcher = Dispatcher::spawn(reader, writer, dispatcher_config);

                Ok((dispatcher, AdapterProcess::None))
            }
            AdapterDescriptor::Server {
                command,
                args,
                connect_condition,
            } => {
                let server = SharedServer::spawn(
                    command,
                    args,
                    connect_condition,
                    connect_config.server_port_detect_timeout,
                )
                .await?;
                let (dispatcher, conn) = server.connect(dispatcher_config, connect_config).await?;
                Ok((dispatcher, AdapterProcess::Shared(conn)))
            }
        }
    }
}

/// Identifies a `server` descriptor for the purpose of deciding whether
/// two connect calls mean "the same helper". `connect_condition` is a
/// closure and can't be compared, so identity is just `command` + `args`
/// - good enough in practice since those two fully determine what gets
/// spawned.
type ServerKey = (String, Vec<String>);

/// Spawns and caches [`SharedServer`] processes keyed by descriptor
/// identity, so that concurrent or repeated [`connect`](Self::connect)
/// calls for "the same" `server` descriptor share one helper process
/// instead of each spawning their own.
///
/// Each key gets its own `tokio::sync::Mutex` guarding a lazily spawned
/// `Arc<SharedServer>`; a connect attempt holds that mutex across both
/// the spawn (if needed) and the TCP connect, so a second caller for the
/// same key blocks until the first is done rather than spawning a
/// competing process. Different keys proceed concurrently since each
/// gets its own mutex.
#[derive(Default)]
pub struct AdapterFactory {
    servers: AsyncMutex<std::collections::HashMap<ServerKey, Arc<AsyncMutex<Option<Arc<SharedServer>>>>>>,
}

impl AdapterFactory {
    /// An empty factory with no cached servers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to `descriptor`, sharing a helper process across calls
    /// for `server` mode descriptors with the same command and args.
    /// `stdio` and `tcp` descriptors have no shared state to key on and
    /// are passed straight through to [`AdapterDescriptor::connect`].
    pub async fn connect(
        &self,
        descriptor: AdapterDescriptor,
        dispatcher_config: DispatcherConfig,
        connect_config: ConnectConfig,
    ) -> eyre::Result<(AdapterDispatcher, AdapterProcess)> {
        let AdapterDescriptor::Server {
            command,
            args,
            connect_condition,
        } = descriptor
        else {
            return descriptor.connect(dispatcher_config, connect_config).await;
        };

        let slot = {
            let key = (command.clone(), args.clone());
            let mut servers = self.servers.lock().await;
            Arc::clone(
                servers
                    .entry(key)
                    .or_insert_with(|| Arc::new(AsyncMutex::new(None))),
            )
        };

        let mut slot = slot.lock().await;

        let existing = slot.clone();
        let reusable = match &existing {
            Some(server) => server.is_alive().await,
            None => false,
        };

        let server = if reusable {
            existing.expect("reusable implies Some")
        } else {
            let server = SharedServer::spawn(
                command,
                args,
                connect_condition,
                connect_config.server_port_detect_timeout,
            )
            .await?;
            *slot = Some(Arc::clone(&server));
            server
        };

        // Held across the connect too: until this resolves, the server's
        // aliveness can't be trusted by another caller waiting on `slot`.
        let result = server.connect(dispatcher_config, connect_config).await;
        drop(slot);

        let (dispatcher, conn) = result?;
        Ok((dispatcher, AdapterProcess::Shared(conn)))
    }
}

async fn connect_tcp(host: &str, port: u16, timeout: Duration) -> eyre::Result<TcpStream> {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => {
            Err(dap_client::DapError::ConnectRefused(e))
                .with_context(|| format!("connecting to {host}:{port}"))
        }
        Err(_) => Err(dap_client::DapError::ConnectTimeout(timeout))
            .with_context(|| format!("connecting to {host}:{port}")),
    }
}

struct SharedServerState {
    process: OwnedProcess,
}

/// A helper process that listens on TCP, shared by however many
/// [`Dispatcher`]s have connected to it.
///
/// The process is spawned once via [`SharedServer::spawn`]; each
/// [`SharedServer::connect`] call opens an independent TCP connection
/// (and thus an independent [`Dispatcher`]) to the same process, and
/// bumps a reference count. The process is terminated when the last
/// [`ServerConnection`] guard is dropped or shut down.
pub struct SharedServer {
    state: AsyncMutex<Option<SharedServerState>>,
    ref_count: AtomicUsize,
    host: String,
    port: u16,
}

impl SharedServer {
    /// Spawn `command` and wait for `connect_condition` to report the
    /// port it's listening on.
    pub async fn spawn(
        command: impl Into<String>,
        args: Vec<String>,
        connect_condition: ConnectCondition,
        ready_timeout: Duration,
    ) -> eyre::Result<Arc<Self>> {
        let command = command.into();
        which::which(&command).with_context(|| format!("{command} not found in PATH"))?;

        let mut child = Command::new(&command)
            .args(&args)
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning {command}"))?;

        let port = wait_for_port(&mut child, &connect_condition, ready_timeout)
            .await
            .context("waiting for server readiness")?;
        let process = monitor_child(child);

        Ok(Arc::new(Self {
            state: AsyncMutex::new(Some(SharedServerState { process })),
            ref_count: AtomicUsize::new(0),
            host: "127.0.0.1".to_string(),
            port,
        }))
    }

    /// Open a new connection to the shared server, returning both its
    /// dispatcher and a guard that keeps the server alive until dropped.
    pub async fn connect(
        self: &Arc<Self>,
        dispatcher_config: DispatcherConfig,
        connect_config: ConnectConfig,
    ) -> eyre::Result<(AdapterDispatcher, ServerConnection)> {
        self.ref_count.fetch_add(1, Ordering::SeqCst);

        let stream = match connect_tcp(&self.host, self.port, connect_config.connect_timeout).await {
            Ok(stream) => stream,
            Err(e) => {
                self.ref_count.fetch_sub(1, Ordering::SeqCst);
                return Err(e);
            }
        };

        let (read, write) = stream.into_split();
        let (reader, writer) = box_halves(read, write, connect_config.max_message_size);
        let dispatcher = Dispatcher::spawn(reader, writer, dispatcher_config);

        Ok((
            dispatcher,
            ServerConnection {
                server: Arc::clone(self),
            },
        ))
    }

    /// Number of live connections sharing this server.
    pub fn ref_count(&self) -> usize {
        self.ref_count.load(Ordering::SeqCst)
    }

    /// Whether the helper process is still running. Unlike [`ref_count`]
    /// (which legitimately hits zero whenever a client's TCP connect
    /// attempt fails, or between the last disconnect and a later
    /// reconnect), this reflects whether [`release`](Self::release) has
    /// actually torn the process down.
    pub async fn is_alive(&self) -> bool {
        self.state.lock().await.is_some()
    }

    async fn release(&self) {
        if self.ref_count.fetch_sub(1, Ordering::SeqCst) != 1 {
            return;
        }

        let mut state = self.state.lock().await;
        if let Some(mut inner) = state.take() {
            if let Err(e) = terminate_gracefully(&mut inner.process).await {
                tracing::warn!(error = %e, "failed to terminate shared server process");
            }
        }
    }
}

/// A guard representing one connection to a [`SharedServer`]. Dropping
/// it (or calling [`shutdown`](Self::shutdown) explicitly) releases the
/// reference; the underlying process is terminated once the last
/// connection releases it.
pub struct ServerConnection {
    server: Arc<SharedServer>,
}

impl ServerConnection {
    /// Release this connection's reference, terminating the server if
    /// it was the last one. Prefer this over letting the guard drop
    /// when you need to know the shutdown finished.
    pub async fn shutdown(self) -> eyre::Result<()> {
        self.server.release().await;
        Ok(())
    }
}

impl Drop for ServerConnection {
    fn drop(&mut self) {
        if self.server.ref_count.fetch_sub(1, Ordering::SeqCst) == 1 {
            tracing::warn!(
                "last ServerConnection dropped without shutdown(); process cleanup is skipped, call shutdown() instead"
            );
            // Undo the decrement so a later explicit shutdown() (e.g. via
            // AdapterProcess::Shared) still sees itself as the last owner.
            self.server.ref_count.fetch_add(1, Ordering::SeqCst);
        }
    }
}
