//! Worker-thread transport
//!
//! The executor host runs on a dedicated thread fed by a crossbeam queue.
//! Messages move across by value; byte buffers are never copied.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use deckport_hid_common::HidBackend;
use tracing::{debug, error, info};

use crate::codec::Message;
use crate::config::TransportConfig;
use crate::error::{IpcError, IpcResult};
use crate::executor::ExecutorHost;
use crate::port::{ChannelPort, Listeners, MessagePort, Outbound};
use crate::transport::{Handshake, Transport, TransportKind};

pub struct WorkerTransport {
    config: TransportConfig,
}

impl WorkerTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Transport for WorkerTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Worker
    }

    async fn connect(&self, backend: Arc<dyn HidBackend>) -> IpcResult<Arc<dyn MessagePort>> {
        let (tx, rx) = crossbeam::channel::unbounded::<Message>();
        let client_listeners = Listeners::new();
        let client: Arc<dyn MessagePort> = Arc::new(ChannelPort::new(
            Arc::clone(&client_listeners),
            Outbound::Queue(tx),
        ));
        let executor_port: Arc<dyn MessagePort> = Arc::new(ChannelPort::new(
            Listeners::new(),
            Outbound::Peer(client_listeners),
        ));

        let handshake = Handshake::arm(Arc::clone(&client));
        let container_config = self.config.container.clone();
        thread::Builder::new()
            .name("deckport-worker".to_string())
            .spawn(move || {
                let host = ExecutorHost::new(backend, executor_port, container_config);
                if let Err(e) = host.announce_ready() {
                    error!(error = %e, "Worker failed to announce ready");
                    return;
                }
                // Ends once every session-side sender is dropped.
                while let Ok(message) = rx.recv() {
                    debug!(message_type = message.type_name(), "Worker received message");
                    host.handle(&message);
                }
                host.shutdown();
            })
            .map_err(|e| IpcError::TransportInit(format!("failed to spawn worker thread: {e}")))?;

        handshake
            .wait(Duration::from_millis(self.config.offload.handshake_timeout_ms))
            .await?;
        info!("Worker transport ready");
        Ok(client)
    }
}
