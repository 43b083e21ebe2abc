//! Executor host
//!
//! Owns one [`DeviceContainer`] per registered path and routes incoming
//! requests to it. The same host runs inside the offload process, on the
//! worker thread, and directly on the caller's thread for in-process use.

use std::collections::HashMap;
use std::sync::Arc;

use deckport_hid_common::HidBackend;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::codec::{HardwareEvent, Message};
use crate::config::ContainerConfig;
use crate::container::DeviceContainer;
use crate::error::{IpcResult, RemoteError};
use crate::port::MessagePort;

pub struct ExecutorHost {
    backend: Arc<dyn HidBackend>,
    port: Arc<dyn MessagePort>,
    config: ContainerConfig,
    containers: Mutex<HashMap<String, Arc<DeviceContainer>>>,
}

impl ExecutorHost {
    pub fn new(
        backend: Arc<dyn HidBackend>,
        port: Arc<dyn MessagePort>,
        config: ContainerConfig,
    ) -> Self {
        Self {
            backend,
            port,
            config,
            containers: Mutex::new(HashMap::new()),
        }
    }

    /// Send the handshake that tells the session side requests may flow.
    pub fn announce_ready(&self) -> IpcResult<()> {
        self.port.post_message(Message::Ready)
    }

    pub fn container_count(&self) -> usize {
        self.containers.lock().len()
    }

    /// Route one incoming message.
    pub fn handle(&self, message: &Message) {
        match message {
            Message::Register { path } => self.register(path),
            Message::Write { path, .. }
            | Message::FeatureReport { path, .. }
            | Message::Close { path, .. }
            | Message::Read { path, .. } => {
                let container = self.containers.lock().get(path.as_str()).cloned();
                match container {
                    Some(container) => container.handle_message(message),
                    None => self.reject_unregistered(path, message),
                }
            }
            other => {
                debug!(
                    message_type = other.type_name(),
                    "Executor ignoring non-request message"
                );
            }
        }
    }

    fn register(&self, path: &str) {
        let existing = self.containers.lock().get(path).cloned();
        if let Some(container) = &existing {
            if !container.is_closed() {
                debug!(path, "Device already registered");
                return;
            }
        }

        let handle = match self.backend.open(path) {
            Ok(handle) => handle,
            Err(e) => {
                error!(path, error = %e, "Failed to open device");
                self.post(Message::Event {
                    path: path.to_string(),
                    event: HardwareEvent::Error(RemoteError::from(&e)),
                });
                return;
            }
        };

        match existing {
            Some(container) => container.reopen(handle),
            None => {
                let container = DeviceContainer::new(
                    path,
                    handle,
                    Arc::clone(&self.port),
                    self.config.clone(),
                );
                self.containers.lock().insert(path.to_string(), container);
                info!(path, "Device registered");
            }
        }
    }

    fn reject_unregistered(&self, path: &str, message: &Message) {
        match message.correlation_id() {
            Some(correlation_id) => self.post(Message::Error {
                path: path.to_string(),
                correlation_id: Some(correlation_id),
                data: RemoteError::not_registered(path),
            }),
            None => warn!(
                path,
                message_type = message.type_name(),
                "Dropping message for unregistered device"
            ),
        }
    }

    fn post(&self, message: Message) {
        if let Err(e) = self.port.post_message(message) {
            warn!(error = %e, "Executor failed to post message");
        }
    }

    /// Close every open device and forget all containers.
    pub fn shutdown(&self) {
        let containers: Vec<_> = self.containers.lock().drain().map(|(_, c)| c).collect();
        for container in containers {
            if container.is_closed() {
                continue;
            }
            if let Err(e) = container.close() {
                warn!(path = container.path(), error = %e, "Close during shutdown failed");
            }
        }
        info!("Executor shut down");
    }
}
