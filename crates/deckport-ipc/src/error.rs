//! IPC-specific error types

use std::io;

use deckport_hid_common::HidCommonError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A device I/O failure as it crosses a transport boundary.
///
/// Executor-side errors are flattened into this plain value so they survive
/// serialization to and from the offload process.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct RemoteError {
    /// Human-readable description
    pub message: String,
    /// Short machine-readable category, e.g. `"write"` or `"disconnected"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl RemoteError {
    /// Create an error with no kind
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
        }
    }

    /// Attach a kind
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// The error for a command addressed to a path with no container.
    pub fn not_registered(path: &str) -> Self {
        Self::new(format!("Device {path} is not registered")).with_kind("not_registered")
    }
}

impl From<&HidCommonError> for RemoteError {
    fn from(e: &HidCommonError) -> Self {
        Self::new(e.to_string()).with_kind(e.kind())
    }
}

impl From<HidCommonError> for RemoteError {
    fn from(e: HidCommonError) -> Self {
        Self::from(&e)
    }
}

/// IPC error type
#[derive(Debug, Error)]
pub enum IpcError {
    /// Transport construction failed
    #[error("Transport initialization failed: {0}")]
    TransportInit(String),

    /// The peer did not complete the ready handshake
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The channel to the executor is gone
    #[error("Channel closed")]
    ChannelClosed,

    /// Message encoding failed
    #[error("Message encoding failed: {0}")]
    EncodingFailed(String),

    /// Message decoding failed
    #[error("Message decoding failed: {0}")]
    DecodingFailed(String),

    /// The executor reported a device failure
    #[error("Device error: {0}")]
    Remote(#[from] RemoteError),

    /// A reply arrived with a payload of the wrong shape
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    /// The caller's cancel signal fired before the reply arrived
    #[error("Request cancelled")]
    Cancelled,

    /// Unknown or unusable transport kind
    #[error("Invalid transport: {0}")]
    InvalidTransport(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl IpcError {
    /// Check if this error is recoverable
    ///
    /// A device failure or cancelled call leaves the transport usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IpcError::Remote(_) | IpcError::Cancelled | IpcError::UnexpectedReply(_)
        )
    }

    /// Check if this error means the transport can no longer be used
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IpcError::TransportInit(_) | IpcError::Handshake(_) | IpcError::ChannelClosed
        )
    }

    /// The remote error, if this is one
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            IpcError::Remote(e) => Some(e),
            _ => None,
        }
    }
}

/// Specialized Result type for IPC operations
pub type IpcResult<T> = std::result::Result<T, IpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_recoverable() {
        let err = IpcError::Remote(RemoteError::new("write failed"));
        assert!(err.is_recoverable());
        assert!(!err.is_fatal());

        let err = IpcError::TransportInit("test".to_string());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_is_fatal() {
        assert!(IpcError::ChannelClosed.is_fatal());
        assert!(IpcError::Handshake("eof".to_string()).is_fatal());
        assert!(!IpcError::Cancelled.is_fatal());
    }

    #[test]
    fn test_remote_error_from_hid_error() {
        let remote = RemoteError::from(HidCommonError::WriteError("pipe".to_string()));
        assert_eq!(remote.message, "Failed to write to device: pipe");
        assert_eq!(remote.kind.as_deref(), Some("write"));

        let err = IpcError::from(remote.clone());
        assert_eq!(err.remote(), Some(&remote));
    }

    #[test]
    fn test_remote_error_wire_shape() -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(&RemoteError::new("gone"))?;
        assert_eq!(json, r#"{"message":"gone"}"#);

        let parsed: RemoteError = serde_json::from_str(r#"{"message":"x","kind":"read"}"#)?;
        assert_eq!(parsed, RemoteError::new("x").with_kind("read"));
        Ok(())
    }
}
