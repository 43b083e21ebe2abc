//! Executor-side owner of one device handle
//!
//! A [`DeviceContainer`] executes commands for a single device path against
//! its blocking [`HidHandle`] and posts the outcome back on the executor's
//! port. Commands for one path run in arrival order. An optional input pump
//! thread forwards input reports as `event` messages.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

use deckport_hid_common::{HidCommonError, HidCommonResult, HidHandle};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::codec::{HardwareEvent, Message, ReplyData};
use crate::config::ContainerConfig;
use crate::error::RemoteError;
use crate::port::MessagePort;

pub struct DeviceContainer {
    path: String,
    handle: Mutex<Box<dyn HidHandle>>,
    port: Arc<dyn MessagePort>,
    config: ContainerConfig,
    closed: AtomicBool,
    /// Bumped on close and reopen; a pump exits once it no longer matches.
    generation: AtomicU64,
}

impl DeviceContainer {
    pub fn new(
        path: impl Into<String>,
        handle: Box<dyn HidHandle>,
        port: Arc<dyn MessagePort>,
        config: ContainerConfig,
    ) -> Arc<Self> {
        let container = Arc::new(Self {
            path: path.into(),
            handle: Mutex::new(handle),
            port,
            config,
            closed: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        });
        container.start_pump();
        container
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Swap in a freshly opened handle after a close.
    pub fn reopen(self: &Arc<Self>, handle: Box<dyn HidHandle>) {
        *self.handle.lock() = handle;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.closed.store(false, Ordering::SeqCst);
        info!(path = %self.path, "Device reopened");
        self.start_pump();
    }

    /// Execute one command addressed to this container.
    pub fn handle_message(&self, message: &Message) {
        let correlation_id = message.correlation_id();
        let outcome = match message {
            Message::Write { data, .. } => self.write_all(data).map(ReplyData::Count),
            Message::FeatureReport { data, .. } => self
                .handle
                .lock()
                .send_feature_report(data)
                .map(ReplyData::Count),
            Message::Close { .. } => self.close().map(|()| ReplyData::Ack),
            Message::Read { .. } => self
                .handle
                .lock()
                .read_timeout(self.config.read_timeout_ms)
                .map(ReplyData::Bytes),
            other => {
                warn!(
                    path = %self.path,
                    message_type = other.type_name(),
                    "Container ignoring non-command message"
                );
                return;
            }
        };

        match (outcome, correlation_id) {
            (Ok(data), Some(correlation_id)) => {
                debug!(path = %self.path, correlation_id, reply = data.shape(), "Command complete");
                self.post(Message::Value {
                    path: self.path.clone(),
                    correlation_id,
                    data,
                });
            }
            (Ok(_), None) => {}
            (Err(e), Some(correlation_id)) => {
                warn!(path = %self.path, correlation_id, error = %e, "Command failed");
                self.post(Message::Error {
                    path: self.path.clone(),
                    correlation_id: Some(correlation_id),
                    data: RemoteError::from(&e),
                });
            }
            (Err(e), None) => {
                error!(
                    path = %self.path,
                    message_type = message.type_name(),
                    error = %e,
                    "Uncorrelated command failed"
                );
            }
        }
    }

    /// Write each buffer in order, looping on partial writes. A write that
    /// accepts nothing ends the whole sequence; the count so far is returned.
    fn write_all(&self, buffers: &[Vec<u8>]) -> HidCommonResult<usize> {
        let mut handle = self.handle.lock();
        let mut total = 0;
        'buffers: for buffer in buffers {
            let mut offset = 0;
            while let Some(rest) = buffer.get(offset..).filter(|rest| !rest.is_empty()) {
                let written = handle.write(rest)?;
                if written == 0 {
                    warn!(path = %self.path, total, "Device accepted no bytes; stopping write");
                    break 'buffers;
                }
                offset += written;
                total += written;
            }
        }
        Ok(total)
    }

    /// Close the handle and stop the input pump.
    pub fn close(&self) -> HidCommonResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
        let result = self.handle.lock().close();
        info!(path = %self.path, "Device closed");
        result
    }

    fn post(&self, message: Message) {
        if let Err(e) = self.port.post_message(message) {
            warn!(path = %self.path, error = %e, "Failed to post reply");
        }
    }

    fn start_pump(self: &Arc<Self>) {
        if !self.config.forward_input {
            return;
        }
        let generation = self.generation.load(Ordering::SeqCst);
        let container = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("deckport-input:{}", self.path))
            .spawn(move || container.pump(generation));
        if let Err(e) = spawned {
            error!(path = %self.path, error = %e, "Failed to start input pump");
        }
    }

    fn pump(&self, generation: u64) {
        let timeout = self.config.poll_timeout();
        debug!(path = %self.path, timeout, "Input pump started");
        while self.generation.load(Ordering::SeqCst) == generation {
            let result = self.handle.lock().read_timeout(timeout);
            if self.generation.load(Ordering::SeqCst) != generation {
                break;
            }
            let event = match result {
                Ok(report) if report.is_empty() => continue,
                Ok(report) => HardwareEvent::Data(report),
                Err(e) => {
                    error!(path = %self.path, error = %e, "Input read failed");
                    HardwareEvent::Error(RemoteError::from(&e))
                }
            };
            let stop = matches!(event, HardwareEvent::Error(_));
            let posted = self.port.post_message(Message::Event {
                path: self.path.clone(),
                event,
            });
            if posted.is_err() || stop {
                break;
            }
        }
        debug!(path = %self.path, "Input pump stopped");
    }
}

impl Drop for DeviceContainer {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            let handle = self.handle.get_mut();
            if let Err(e) = handle.close() {
                if !matches!(e, HidCommonError::Disconnected) {
                    warn!(path = %self.path, error = %e, "Close on drop failed");
                }
            }
        }
    }
}
