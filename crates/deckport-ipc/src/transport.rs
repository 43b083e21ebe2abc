//! Transport abstraction for IPC

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use deckport_hid_common::HidBackend;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::codec::Message;
use crate::config::TransportConfig;
use crate::error::{IpcError, IpcResult};
use crate::executor::ExecutorHost;
use crate::port::{ListenerId, MessagePort, in_process_pair};
use crate::process::ProcessTransport;
use crate::worker::WorkerTransport;

/// Which transport carries messages between sessions and executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Try the offload process, fall back to in-process
    #[default]
    Auto,
    /// `deckport-offload` child process over stdin/stdout
    Process,
    /// Dedicated executor thread
    Worker,
    /// Executor runs on the posting thread
    #[serde(alias = "emulated")]
    InProcess,
}

impl TransportKind {
    /// Every accepted name, for error messages.
    pub const NAMES: [&'static str; 4] = ["auto", "process", "worker", "in-process"];

    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Auto => "auto",
            TransportKind::Process => "process",
            TransportKind::Worker => "worker",
            TransportKind::InProcess => "in-process",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = IpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(TransportKind::Auto),
            "process" => Ok(TransportKind::Process),
            "worker" => Ok(TransportKind::Worker),
            "in-process" | "emulated" => Ok(TransportKind::InProcess),
            other => Err(IpcError::InvalidTransport(format!(
                "unknown transport {other:?}, expected one of: {}",
                Self::NAMES.join(", ")
            ))),
        }
    }
}

/// Builds a connected session-side port.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// The strategy this transport implements
    fn kind(&self) -> TransportKind;

    /// Start the executor side and return the session-side port once it is
    /// ready for traffic.
    async fn connect(&self, backend: Arc<dyn HidBackend>) -> IpcResult<Arc<dyn MessagePort>>;
}

/// Concrete transport for `kind`. `Auto` is resolved by the context, not
/// here.
pub fn transport_for(kind: TransportKind, config: &TransportConfig) -> IpcResult<Box<dyn Transport>> {
    match kind {
        TransportKind::Process => Ok(Box::new(ProcessTransport::new(config.clone()))),
        TransportKind::Worker => Ok(Box::new(WorkerTransport::new(config.clone()))),
        TransportKind::InProcess => Ok(Box::new(InProcessTransport::new(config.clone()))),
        TransportKind::Auto => Err(IpcError::InvalidTransport(
            "auto has no transport of its own".to_string(),
        )),
    }
}

/// Executor on the caller's thread. Every post runs the command to
/// completion before returning.
pub struct InProcessTransport {
    config: TransportConfig,
}

impl InProcessTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Transport for InProcessTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::InProcess
    }

    async fn connect(&self, backend: Arc<dyn HidBackend>) -> IpcResult<Arc<dyn MessagePort>> {
        let (client, executor) = in_process_pair();
        let executor_port: Arc<dyn MessagePort> = executor.clone();
        let host = ExecutorHost::new(backend, executor_port, self.config.container.clone());
        // The port's listener keeps the host alive for as long as the pair exists.
        executor.subscribe(Arc::new(move |message: &Message| host.handle(message)));
        info!("In-process transport ready");
        Ok(client)
    }
}

/// Waits for the executor's `ready` message.
///
/// Arm it before the executor can start sending, then await [`Handshake::wait`].
pub(crate) struct Handshake {
    port: Arc<dyn MessagePort>,
    id: ListenerId,
    rx: oneshot::Receiver<IpcResult<()>>,
}

impl Handshake {
    pub(crate) fn arm(port: Arc<dyn MessagePort>) -> Self {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let id = port.subscribe(Arc::new(move |message: &Message| {
            let Some(tx) = slot.lock().take() else {
                return;
            };
            let outcome = match message {
                Message::Ready => Ok(()),
                other => Err(IpcError::Handshake(format!(
                    "expected ready, got {}",
                    other.type_name()
                ))),
            };
            if tx.send(outcome).is_err() {
                debug!("Handshake waiter already gone");
            }
        }));
        Self { port, id, rx }
    }

    pub(crate) async fn wait(self, timeout: Duration) -> IpcResult<()> {
        let result = match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_closed)) => Err(IpcError::Handshake(
                "executor went away before sending ready".to_string(),
            )),
            Err(_elapsed) => Err(IpcError::Handshake(format!(
                "no ready message within {}ms",
                timeout.as_millis()
            ))),
        };
        self.port.unsubscribe(self.id);
        result
    }
}
