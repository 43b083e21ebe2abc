//! Transport context
//!
//! Holds everything sessions share: one cached port per transport kind, the
//! correlation-id counter, the pending-call table, per-path open counts and
//! per-path event subscribers. Tests build isolated contexts; applications
//! normally use [`TransportContext::global`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use deckport_hid_common::{HidApiBackend, HidBackend};
use parking_lot::Mutex;
use tokio::sync::{OnceCell, mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::codec::{HardwareEvent, Message, ReplyData};
use crate::config::TransportConfig;
use crate::error::{IpcError, IpcResult};
use crate::port::{Listener, MessagePort};
use crate::session::DeviceSession;
use crate::transport::{TransportKind, transport_for};

/// Correlation ids are 31-bit and wrap.
pub const CORRELATION_ID_MASK: u32 = 0x7FFF_FFFF;

type Completion = oneshot::Sender<IpcResult<ReplyData>>;

pub struct TransportContext {
    backend: Arc<dyn HidBackend>,
    config: TransportConfig,
    process: OnceCell<Arc<dyn MessagePort>>,
    worker: OnceCell<Arc<dyn MessagePort>>,
    in_process: OnceCell<Arc<dyn MessagePort>>,
    auto: OnceCell<Arc<dyn MessagePort>>,
    routing: Arc<Routing>,
}

impl TransportContext {
    pub fn new(backend: Arc<dyn HidBackend>, config: TransportConfig) -> Arc<Self> {
        Arc::new(Self {
            backend,
            config,
            process: OnceCell::new(),
            worker: OnceCell::new(),
            in_process: OnceCell::new(),
            auto: OnceCell::new(),
            routing: Arc::new(Routing::default()),
        })
    }

    /// Process-wide context over the `hidapi` backend with default settings.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<TransportContext>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| {
            Self::new(Arc::new(HidApiBackend::new()), TransportConfig::default())
        }))
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn HidBackend> {
        &self.backend
    }

    /// The port for `kind`, connecting it on first use. Failed connections
    /// are not cached, so a later call retries.
    pub async fn port(&self, kind: TransportKind) -> IpcResult<Arc<dyn MessagePort>> {
        match kind {
            TransportKind::Auto => self
                .auto
                .get_or_try_init(|| async {
                    match self.cached_port(TransportKind::Process).await {
                        Ok(port) => Ok(port),
                        Err(e) => {
                            warn!(error = %e, "Offload process unavailable, falling back to in-process");
                            self.cached_port(TransportKind::InProcess).await
                        }
                    }
                })
                .await
                .cloned(),
            concrete => self.cached_port(concrete).await,
        }
    }

    async fn cached_port(&self, kind: TransportKind) -> IpcResult<Arc<dyn MessagePort>> {
        let cell = match kind {
            TransportKind::Process => &self.process,
            TransportKind::Worker => &self.worker,
            TransportKind::InProcess => &self.in_process,
            TransportKind::Auto => {
                return Err(IpcError::InvalidTransport(
                    "auto is not a concrete transport".to_string(),
                ));
            }
        };
        cell.get_or_try_init(|| async {
            let transport = transport_for(kind, &self.config)?;
            let port = transport.connect(Arc::clone(&self.backend)).await?;
            port.subscribe(Routing::listener(&self.routing));
            info!(transport = %kind, "Transport connected");
            Ok(port)
        })
        .await
        .cloned()
    }

    /// A session for `path` over the `kind` transport.
    pub async fn session(
        &self,
        kind: TransportKind,
        path: impl Into<String>,
    ) -> IpcResult<DeviceSession> {
        let port = self.port(kind).await?;
        Ok(DeviceSession::new(path, port, Arc::clone(&self.routing)))
    }

    /// Logical opens outstanding for `path`.
    pub fn open_count(&self, path: &str) -> usize {
        self.routing.open_count(path)
    }

    /// Calls still waiting for a reply, across all sessions.
    pub fn pending_count(&self) -> usize {
        self.routing.pending.lock().len()
    }
}

/// What happened when a session released its reference to a path.
pub(crate) enum Release<T> {
    /// Other references remain
    Shared,
    /// This was the last one; carries the teardown result
    Last(T),
}

/// Shared session-side state, reached from both sessions and the router
/// listener subscribed on every port.
#[derive(Default)]
pub(crate) struct Routing {
    next_id: AtomicU32,
    pub(crate) pending: Mutex<HashMap<u32, Completion>>,
    open_counts: Mutex<HashMap<String, usize>>,
    event_listeners: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<HardwareEvent>>>>,
}

impl Routing {
    pub(crate) fn listener(routing: &Arc<Self>) -> Listener {
        let routing = Arc::clone(routing);
        Arc::new(move |message: &Message| routing.route(message))
    }

    /// Reserve a correlation id not currently in use and store its slot.
    pub(crate) fn allocate(&self) -> (u32, oneshot::Receiver<IpcResult<ReplyData>>) {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock();
        let id = loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed) & CORRELATION_ID_MASK;
            if !pending.contains_key(&id) {
                break id;
            }
        };
        pending.insert(id, tx);
        (id, rx)
    }

    /// Drop a pending slot without completing it.
    pub(crate) fn forget(&self, id: u32) -> bool {
        self.pending.lock().remove(&id).is_some()
    }

    /// Count one more open of `path`. `on_first` runs, under the count lock,
    /// only for the 0 → 1 transition; if it fails the count is unchanged.
    pub(crate) fn acquire(
        &self,
        path: &str,
        on_first: impl FnOnce() -> IpcResult<()>,
    ) -> IpcResult<()> {
        let mut counts = self.open_counts.lock();
        let count = counts.get(path).copied().unwrap_or(0);
        if count == 0 {
            on_first()?;
        }
        counts.insert(path.to_string(), count.saturating_add(1));
        Ok(())
    }

    /// Count one less open of `path`. `on_last` runs, under the count lock,
    /// only for the transition to zero.
    pub(crate) fn release<T>(&self, path: &str, on_last: impl FnOnce() -> T) -> Release<T> {
        let mut counts = self.open_counts.lock();
        match counts.get(path).copied() {
            Some(count) if count > 1 => {
                counts.insert(path.to_string(), count - 1);
                Release::Shared
            }
            _ => {
                counts.remove(path);
                Release::Last(on_last())
            }
        }
    }

    fn open_count(&self, path: &str) -> usize {
        self.open_counts.lock().get(path).copied().unwrap_or(0)
    }

    pub(crate) fn subscribe_events(&self, path: &str) -> mpsc::UnboundedReceiver<HardwareEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_listeners
            .lock()
            .entry(path.to_string())
            .or_default()
            .push(tx);
        rx
    }

    fn route(&self, message: &Message) {
        match message {
            Message::Value {
                path,
                correlation_id,
                data,
            } => self.complete(path, *correlation_id, Ok(data.clone())),
            Message::Error {
                path,
                correlation_id: Some(correlation_id),
                data,
            } => self.complete(path, *correlation_id, Err(IpcError::Remote(data.clone()))),
            Message::Error {
                path,
                correlation_id: None,
                data,
            } => error!(path = %path, error = %data, "Executor reported an uncorrelated failure"),
            Message::Event { path, event } => self.emit(path, event),
            Message::Ready => debug!("Executor ready"),
            request => warn!(
                path = request.path().unwrap_or_default(),
                message_type = request.type_name(),
                "Dropping request-shaped message from executor"
            ),
        }
    }

    fn complete(&self, path: &str, correlation_id: u32, outcome: IpcResult<ReplyData>) {
        let slot = self.pending.lock().remove(&correlation_id);
        match slot {
            Some(tx) => {
                trace!(path, correlation_id, "Completing call");
                if tx.send(outcome).is_err() {
                    debug!(path, correlation_id, "Reply arrived after its caller went away");
                }
            }
            None => warn!(path, correlation_id, "Dropping reply with no pending call"),
        }
    }

    fn emit(&self, path: &str, event: &HardwareEvent) {
        let mut listeners = self.event_listeners.lock();
        let delivered = match listeners.get_mut(path) {
            Some(senders) => {
                senders.retain(|tx| tx.send(event.clone()).is_ok());
                let delivered = !senders.is_empty();
                if !delivered {
                    listeners.remove(path);
                }
                delivered
            }
            None => false,
        };
        drop(listeners);

        if !delivered {
            match event {
                HardwareEvent::Error(e) => {
                    error!(path, error = %e, "Hardware error with no subscriber");
                }
                HardwareEvent::Data(report) => {
                    trace!(path, len = report.len(), "Input report with no subscriber");
                }
            }
        }
    }
}
