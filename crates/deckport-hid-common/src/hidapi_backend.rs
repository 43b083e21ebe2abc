//! `hidapi` backed implementation of [`HidBackend`]

use std::ffi::CString;

use hidapi::{HidApi, HidDevice};
use tracing::debug;

use crate::{HidBackend, HidCommonError, HidCommonResult, HidDeviceInfo, HidHandle};

/// Largest input report read in one call.
const READ_BUFFER_SIZE: usize = 512;

/// Backend over the platform hidapi library. A fresh `HidApi` context is
/// created per enumeration or open, so the backend itself holds no handle
/// and can be shared across threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct HidApiBackend;

impl HidApiBackend {
    pub fn new() -> Self {
        Self
    }

    fn api() -> HidCommonResult<HidApi> {
        HidApi::new().map_err(|e| HidCommonError::OpenError(format!("hidapi init failed: {e}")))
    }
}

impl HidBackend for HidApiBackend {
    fn list_devices(&self) -> HidCommonResult<Vec<HidDeviceInfo>> {
        let api = Self::api()?;
        let devices = api
            .device_list()
            .map(|d| {
                let mut info = HidDeviceInfo::new(
                    d.vendor_id(),
                    d.product_id(),
                    d.path().to_string_lossy().into_owned(),
                );
                info.serial_number = d.serial_number().map(str::to_string);
                info.manufacturer = d.manufacturer_string().map(str::to_string);
                info.product_name = d.product_string().map(str::to_string);
                info
            })
            .collect::<Vec<_>>();
        debug!(count = devices.len(), "Enumerated HID devices");
        Ok(devices)
    }

    fn open(&self, path: &str) -> HidCommonResult<Box<dyn HidHandle>> {
        let c_path = CString::new(path)
            .map_err(|_nul| HidCommonError::OpenError(format!("path contains NUL: {path:?}")))?;
        let device = Self::api()?
            .open_path(&c_path)
            .map_err(|e| HidCommonError::OpenError(format!("{path}: {e}")))?;
        debug!(path, "Opened HID device");
        Ok(Box::new(HidApiHandle {
            device: Some(device),
        }))
    }
}

/// An opened hidapi device. Dropping the inner `HidDevice` closes it.
pub struct HidApiHandle {
    device: Option<HidDevice>,
}

impl HidApiHandle {
    fn device(&self) -> HidCommonResult<&HidDevice> {
        self.device.as_ref().ok_or(HidCommonError::Disconnected)
    }
}

impl HidHandle for HidApiHandle {
    fn write(&mut self, data: &[u8]) -> HidCommonResult<usize> {
        self.device()?
            .write(data)
            .map_err(|e| HidCommonError::WriteError(e.to_string()))
    }

    fn send_feature_report(&mut self, data: &[u8]) -> HidCommonResult<usize> {
        self.device()?
            .send_feature_report(data)
            .map_err(|e| HidCommonError::WriteError(e.to_string()))?;
        Ok(data.len())
    }

    fn read_timeout(&mut self, timeout_ms: i32) -> HidCommonResult<Vec<u8>> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let n = self
            .device()?
            .read_timeout(&mut buf, timeout_ms)
            .map_err(|e| HidCommonError::ReadError(e.to_string()))?;
        buf.truncate(n);
        Ok(buf)
    }

    fn close(&mut self) -> HidCommonResult<()> {
        self.device = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }
}
