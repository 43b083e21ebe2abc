//! Error types for the device facade

use deckport_hid_common::HidCommonError;
use deckport_ipc::IpcError;
use hid_streamdeck_protocol::StreamDeckError;
use thiserror::Error;

/// A device selection filter named something no supported model matches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("No implementations for any product of vendor {vendor:#06x}")]
    MissingVendor { vendor: u16 },

    #[error("No implementations for the product {product:#06x} of vendor {vendor:#06x}")]
    MissingProduct { vendor: u16, product: u16 },
}

impl SelectionError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            SelectionError::MissingVendor { .. } => "STRMDCK_MISSING_VENDOR",
            SelectionError::MissingProduct { .. } => "STRMDCK_MISSING_PRODUCT",
        }
    }
}

#[derive(Debug, Error)]
pub enum DeckError {
    /// Caller input rejected before any device traffic
    #[error(transparent)]
    Protocol(#[from] StreamDeckError),

    #[error(transparent)]
    Ipc(#[from] IpcError),

    #[error(transparent)]
    Hid(#[from] HidCommonError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl DeckError {
    /// Whether the error was raised by input validation, in which case
    /// nothing was sent to the device.
    pub fn is_validation(&self) -> bool {
        matches!(self, DeckError::Protocol(_))
    }

    pub fn code(&self) -> Option<&'static str> {
        match self {
            DeckError::Selection(e) => Some(e.code()),
            _ => None,
        }
    }
}

pub type DeckResult<T> = Result<T, DeckError>;
