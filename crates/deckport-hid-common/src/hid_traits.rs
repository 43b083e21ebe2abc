//! HID device traits
//!
//! A [`HidHandle`] is a blocking, single-owner handle to one opened device.
//! Nothing here is async: the executor side of deckport owns these handles
//! on its own thread (or process) and the async layer lives above it.

use crate::{HidCommonResult, HidDeviceInfo};

/// Blocking handle to one opened HID device.
pub trait HidHandle: Send {
    /// Write one output report. Returns the number of bytes accepted, which
    /// may be less than `data.len()`; callers loop on partial writes.
    fn write(&mut self, data: &[u8]) -> HidCommonResult<usize>;

    /// Send a feature report. Returns the number of bytes sent.
    fn send_feature_report(&mut self, data: &[u8]) -> HidCommonResult<usize>;

    /// Read one input report, waiting at most `timeout_ms` milliseconds
    /// (`0` polls, `-1` blocks). An empty vector means no report arrived.
    fn read_timeout(&mut self, timeout_ms: i32) -> HidCommonResult<Vec<u8>>;

    fn close(&mut self) -> HidCommonResult<()>;

    fn is_open(&self) -> bool;
}

/// Enumerates and opens devices.
pub trait HidBackend: Send + Sync {
    fn list_devices(&self) -> HidCommonResult<Vec<HidDeviceInfo>>;

    fn open(&self, path: &str) -> HidCommonResult<Box<dyn HidHandle>>;
}

pub mod mock {
    use super::*;
    use crate::HidCommonError;
    use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Test double for a physical device. Clones share state, so a test can
    /// keep one clone while the backend hands handles to the executor.
    #[derive(Clone)]
    pub struct MockHidDevice {
        info: HidDeviceInfo,
        input_tx: Sender<Vec<u8>>,
        input_rx: Receiver<Vec<u8>>,
        write_history: Arc<Mutex<Vec<Vec<u8>>>>,
        feature_history: Arc<Mutex<Vec<Vec<u8>>>>,
        connected: Arc<AtomicBool>,
        write_limit: Arc<Mutex<Option<usize>>>,
        stalled: Arc<AtomicBool>,
        open_count: Arc<AtomicUsize>,
        close_count: Arc<AtomicUsize>,
    }

    impl MockHidDevice {
        pub fn new(vendor_id: u16, product_id: u16, path: impl Into<String>) -> Self {
            let (input_tx, input_rx) = unbounded();
            Self {
                info: HidDeviceInfo::new(vendor_id, product_id, path),
                input_tx,
                input_rx,
                write_history: Arc::new(Mutex::new(Vec::new())),
                feature_history: Arc::new(Mutex::new(Vec::new())),
                connected: Arc::new(AtomicBool::new(true)),
                write_limit: Arc::new(Mutex::new(None)),
                stalled: Arc::new(AtomicBool::new(false)),
                open_count: Arc::new(AtomicUsize::new(0)),
                close_count: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn info(&self) -> &HidDeviceInfo {
            &self.info
        }

        /// Queue an input report for the next read.
        pub fn queue_read(&self, data: Vec<u8>) {
            // The device holds its own receiver, so the channel never closes.
            self.input_tx.send(data).ok();
        }

        /// Every output report accepted so far, one entry per write call.
        pub fn get_write_history(&self) -> Vec<Vec<u8>> {
            self.write_history.lock().clone()
        }

        pub fn get_feature_history(&self) -> Vec<Vec<u8>> {
            self.feature_history.lock().clone()
        }

        /// Accept at most `limit` bytes per write call.
        pub fn set_write_limit(&self, limit: Option<usize>) {
            *self.write_limit.lock() = limit;
        }

        /// Make every write report zero bytes written.
        pub fn stall_writes(&self, stalled: bool) {
            self.stalled.store(stalled, Ordering::SeqCst);
        }

        pub fn disconnect(&self) {
            self.connected.store(false, Ordering::SeqCst);
        }

        pub fn open_count(&self) -> usize {
            self.open_count.load(Ordering::SeqCst)
        }

        pub fn close_count(&self) -> usize {
            self.close_count.load(Ordering::SeqCst)
        }

        fn handle(&self) -> MockHidHandle {
            self.open_count.fetch_add(1, Ordering::SeqCst);
            MockHidHandle {
                device: self.clone(),
                open: true,
            }
        }
    }

    pub struct MockHidHandle {
        device: MockHidDevice,
        open: bool,
    }

    impl MockHidHandle {
        fn check_usable(&self) -> HidCommonResult<()> {
            if !self.open || !self.device.connected.load(Ordering::SeqCst) {
                return Err(HidCommonError::Disconnected);
            }
            Ok(())
        }
    }

    impl HidHandle for MockHidHandle {
        fn write(&mut self, data: &[u8]) -> HidCommonResult<usize> {
            self.check_usable()?;
            if self.device.stalled.load(Ordering::SeqCst) {
                return Ok(0);
            }

            let accepted = match *self.device.write_limit.lock() {
                Some(limit) => data.len().min(limit),
                None => data.len(),
            };
            let chunk = data.get(..accepted).unwrap_or(data);
            self.device.write_history.lock().push(chunk.to_vec());
            Ok(accepted)
        }

        fn send_feature_report(&mut self, data: &[u8]) -> HidCommonResult<usize> {
            self.check_usable()?;
            self.device.feature_history.lock().push(data.to_vec());
            Ok(data.len())
        }

        fn read_timeout(&mut self, timeout_ms: i32) -> HidCommonResult<Vec<u8>> {
            self.check_usable()?;
            let rx = &self.device.input_rx;
            let received = match timeout_ms {
                0 => match rx.try_recv() {
                    Ok(data) => Some(data),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => return Err(HidCommonError::Disconnected),
                },
                t if t < 0 => Some(rx.recv().map_err(|_disconnected| HidCommonError::Disconnected)?),
                t => match rx.recv_timeout(Duration::from_millis(u64::from(t.unsigned_abs()))) {
                    Ok(data) => Some(data),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => {
                        return Err(HidCommonError::Disconnected);
                    }
                },
            };
            Ok(received.unwrap_or_default())
        }

        fn close(&mut self) -> HidCommonResult<()> {
            if self.open {
                self.open = false;
                self.device.close_count.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open
        }
    }

    #[derive(Default)]
    pub struct MockHidBackend {
        devices: Mutex<Vec<MockHidDevice>>,
    }

    impl MockHidBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_device(&self, device: MockHidDevice) {
            self.devices.lock().push(device);
        }

        pub fn device_count(&self) -> usize {
            self.devices.lock().len()
        }
    }

    impl HidBackend for MockHidBackend {
        fn list_devices(&self) -> HidCommonResult<Vec<HidDeviceInfo>> {
            Ok(self
                .devices
                .lock()
                .iter()
                .map(|d| d.info.clone())
                .collect())
        }

        fn open(&self, path: &str) -> HidCommonResult<Box<dyn HidHandle>> {
            let devices = self.devices.lock();
            let device = devices
                .iter()
                .find(|d| d.info.path == path)
                .ok_or_else(|| HidCommonError::DeviceNotFound(path.to_string()))?;
            if !device.connected.load(Ordering::SeqCst) {
                return Err(HidCommonError::OpenError(format!("{path} is disconnected")));
            }
            Ok(Box::new(device.handle()))
        }
    }
}
