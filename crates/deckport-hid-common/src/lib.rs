//! Common HID utilities for deckport
//!
//! This crate provides the blocking device-handle abstraction that the
//! executor side of deckport drives, a `hidapi` backed implementation, and
//! mock devices for tests.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod device_info;
pub mod hid_traits;
pub mod hidapi_backend;

pub use device_info::*;
pub use hid_traits::*;
pub use hidapi_backend::HidApiBackend;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HidCommonError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open device: {0}")]
    OpenError(String),

    #[error("Failed to read from device: {0}")]
    ReadError(String),

    #[error("Failed to write to device: {0}")]
    WriteError(String),

    #[error("Device disconnected")]
    Disconnected,
}

impl HidCommonError {
    /// Short machine-readable name of the error variant.
    pub fn kind(&self) -> &'static str {
        match self {
            HidCommonError::DeviceNotFound(_) => "device_not_found",
            HidCommonError::OpenError(_) => "open",
            HidCommonError::ReadError(_) => "read",
            HidCommonError::WriteError(_) => "write",
            HidCommonError::Disconnected => "disconnected",
        }
    }
}

pub type HidCommonResult<T> = Result<T, HidCommonError>;
