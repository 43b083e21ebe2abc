//! Offload-process transport
//!
//! The executor host runs in a `deckport-offload` child process. Messages
//! travel as newline-delimited JSON: requests on the child's stdin, replies
//! and events on its stdout. The child logs to stderr, which is inherited.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use deckport_hid_common::HidBackend;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::{debug, error, info, warn};

use crate::codec::{Message, MessageCodec};
use crate::config::{ContainerConfig, TransportConfig};
use crate::error::{IpcError, IpcResult};
use crate::executor::ExecutorHost;
use crate::port::{ChannelPort, Listener, ListenerId, Listeners, MessagePort, Outbound};
use crate::transport::{Handshake, Transport, TransportKind};

/// Environment variable naming the offload executable.
pub const OFFLOAD_BIN_ENV: &str = "DECKPORT_OFFLOAD_BIN";

/// File name of the offload executable, without platform suffix.
pub const OFFLOAD_BIN_NAME: &str = "deckport-offload";

pub struct ProcessTransport {
    config: TransportConfig,
}

impl ProcessTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Explicit config first, then the environment, then the executable
    /// installed next to the current one.
    pub fn resolve_program(&self) -> IpcResult<PathBuf> {
        if let Some(program) = &self.config.offload.program {
            return Ok(program.clone());
        }
        if let Some(program) = std::env::var_os(OFFLOAD_BIN_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(program));
        }

        let exe = std::env::current_exe().map_err(|e| {
            IpcError::TransportInit(format!("cannot locate current executable: {e}"))
        })?;
        let dir = exe.parent().ok_or_else(|| {
            IpcError::TransportInit(format!("{} has no parent directory", exe.display()))
        })?;
        let file_name = format!("{OFFLOAD_BIN_NAME}{}", std::env::consts::EXE_SUFFIX);
        let candidate = dir.join(&file_name);
        // Test and bench executables live one level below the binaries.
        if !candidate.exists() && dir.ends_with("deps") {
            if let Some(parent) = dir.parent() {
                return Ok(parent.join(&file_name));
            }
        }
        Ok(candidate)
    }

    fn command(&self, program: &PathBuf) -> Command {
        let container = &self.config.container;
        let mut command = Command::new(program);
        command
            .arg("--poll-interval-ms")
            .arg(container.poll_interval_ms.to_string())
            .arg("--read-timeout-ms")
            .arg(container.read_timeout_ms.to_string());
        if !container.forward_input {
            command.arg("--no-forward-input");
        }
        command
            .args(&self.config.offload.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        command
    }
}

#[async_trait::async_trait]
impl Transport for ProcessTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Process
    }

    // The backend lives in the child, which opens its own.
    async fn connect(&self, _backend: Arc<dyn HidBackend>) -> IpcResult<Arc<dyn MessagePort>> {
        let program = self.resolve_program()?;
        let mut child = self.command(&program).spawn().map_err(|e| {
            IpcError::TransportInit(format!("failed to spawn {}: {e}", program.display()))
        })?;
        info!(program = %program.display(), pid = ?child.id(), "Spawned offload process");

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            kill(&mut child);
            return Err(IpcError::TransportInit(
                "offload process has no stdio pipes".to_string(),
            ));
        };

        let listeners = Listeners::new();
        let closed = Arc::new(AtomicBool::new(false));
        let (tx, rx) = unbounded_channel();
        let channel = ChannelPort::new(Arc::clone(&listeners), Outbound::pipe(tx))
            .with_closed_flag(Arc::clone(&closed));
        let port: Arc<dyn MessagePort> = Arc::new(ProcessPort { channel, child });

        let handshake = Handshake::arm(Arc::clone(&port));
        tokio::spawn(write_lines(stdin, rx, Arc::clone(&closed)));
        tokio::spawn(read_lines(stdout, listeners, closed));
        handshake
            .wait(Duration::from_millis(self.config.offload.handshake_timeout_ms))
            .await?;

        info!("Offload transport ready");
        Ok(port)
    }
}

/// Session-side port to a running offload process. Dropping it kills the
/// child.
struct ProcessPort {
    channel: ChannelPort,
    child: Child,
}

impl MessagePort for ProcessPort {
    fn post_message(&self, message: Message) -> IpcResult<()> {
        self.channel.post_message(message)
    }

    fn subscribe(&self, listener: Listener) -> ListenerId {
        self.channel.subscribe(listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.channel.unsubscribe(id)
    }

    fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }
}

impl Drop for ProcessPort {
    fn drop(&mut self) {
        self.channel.close();
        kill(&mut self.child);
    }
}

// The runtime reaps the child once it exits.
fn kill(child: &mut Child) {
    match child.try_wait() {
        Ok(Some(status)) => debug!(%status, "Offload process already exited"),
        Ok(None) => {
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "Failed to kill offload process");
            }
        }
        Err(e) => warn!(error = %e, "Failed to query offload process"),
    }
}

/// Drain queued request lines into the child's stdin. Ends when the port
/// is dropped or the pipe breaks.
async fn write_lines<W>(
    mut stdin: W,
    mut lines: UnboundedReceiver<Vec<u8>>,
    closed: Arc<AtomicBool>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines.recv().await {
        let written = match stdin.write_all(&line).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            error!(error = %e, "Writing to offload process failed");
            closed.store(true, Ordering::SeqCst);
            break;
        }
    }
    debug!("Offload request writer stopped");
}

/// Dispatch every reply and event line the child writes to stdout.
async fn read_lines<R>(stdout: R, listeners: Arc<Listeners>, closed: Arc<AtomicBool>)
where
    R: AsyncRead + Unpin,
{
    let codec = MessageCodec::new();
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match codec.decode_line(line.as_bytes()) {
                Ok(message) => listeners.dispatch(&message),
                Err(e) => warn!(error = %e, "Dropping undecodable line from offload process"),
            },
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "Reading from offload process failed");
                break;
            }
        }
    }
    closed.store(true, Ordering::SeqCst);
    // Releases a pending handshake so it fails instead of timing out.
    listeners.clear();
    info!("Offload process channel closed");
}

/// Executor loop of the offload process: announce ready, then execute one
/// request per input line until the input closes.
pub fn run_offload_host(
    config: ContainerConfig,
    backend: Arc<dyn HidBackend>,
    input: impl BufRead,
    output: Box<dyn Write + Send>,
) -> IpcResult<()> {
    let port: Arc<dyn MessagePort> = Arc::new(ChannelPort::new(
        Listeners::new(),
        Outbound::lines(output),
    ));
    let host = ExecutorHost::new(backend, port, config);
    host.announce_ready()?;
    info!("Offload host ready");

    let codec = MessageCodec::new();
    let result = input.split(b'\n').try_for_each(|line| -> std::io::Result<()> {
        let line = line?;
        if line.trim_ascii().is_empty() {
            return Ok(());
        }
        match codec.decode_line(&line) {
            Ok(message) => host.handle(&message),
            Err(e) => warn!(error = %e, "Skipping undecodable request"),
        }
        Ok(())
    });

    host.shutdown();
    info!("Offload host input closed");
    result.map_err(IpcError::Io)
}
