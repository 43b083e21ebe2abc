//! Wire messages and the line codec used across process boundaries
//!
//! Every message is one JSON object, internally tagged by `"type"`, with
//! camelCase field names. Byte buffers travel as arrays of integers. Over a
//! pipe each message is terminated by a single `\n`; in-process transports
//! pass the typed [`Message`] directly.

use serde::{Deserialize, Serialize};

use crate::error::{IpcError, IpcResult, RemoteError};

/// Every message exchanged between a session and an executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Message {
    /// Open the device at `path` on the executor side
    Register {
        /// Device path
        path: String,
    },
    /// Write a sequence of output reports, in order
    Write {
        /// Device path
        path: String,
        /// Request tag
        correlation_id: u32,
        /// Buffers written back to back
        data: Vec<Vec<u8>>,
    },
    /// Send one feature report
    FeatureReport {
        /// Device path
        path: String,
        /// Request tag
        correlation_id: u32,
        /// Report bytes
        data: Vec<u8>,
    },
    /// Close the device handle
    Close {
        /// Device path
        path: String,
        /// Request tag; no acknowledgement is sent without one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correlation_id: Option<u32>,
    },
    /// Read one input report
    Read {
        /// Device path
        path: String,
        /// Request tag
        correlation_id: u32,
    },
    /// Successful reply
    Value {
        /// Device path
        path: String,
        /// Tag of the request being answered
        correlation_id: u32,
        /// Result payload
        data: ReplyData,
    },
    /// Failed reply, or an uncorrelated failure report
    Error {
        /// Device path
        path: String,
        /// Tag of the request being answered, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correlation_id: Option<u32>,
        /// What went wrong
        data: RemoteError,
    },
    /// Unsolicited hardware event
    Event {
        /// Device path
        path: String,
        /// The event
        event: HardwareEvent,
    },
    /// Executor handshake; always the first message a spawned executor sends
    Ready,
}

impl Message {
    /// Device path this message is about. `None` only for `ready`.
    pub fn path(&self) -> Option<&str> {
        match self {
            Message::Register { path }
            | Message::Write { path, .. }
            | Message::FeatureReport { path, .. }
            | Message::Close { path, .. }
            | Message::Read { path, .. }
            | Message::Value { path, .. }
            | Message::Error { path, .. }
            | Message::Event { path, .. } => Some(path),
            Message::Ready => None,
        }
    }

    /// Correlation id, if this message carries one.
    pub fn correlation_id(&self) -> Option<u32> {
        match self {
            Message::Write { correlation_id, .. }
            | Message::FeatureReport { correlation_id, .. }
            | Message::Read { correlation_id, .. }
            | Message::Value { correlation_id, .. } => Some(*correlation_id),
            Message::Close { correlation_id, .. } | Message::Error { correlation_id, .. } => {
                *correlation_id
            }
            Message::Register { .. } | Message::Event { .. } | Message::Ready => None,
        }
    }

    /// Wire tag, for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Register { .. } => "register",
            Message::Write { .. } => "write",
            Message::FeatureReport { .. } => "featureReport",
            Message::Close { .. } => "close",
            Message::Read { .. } => "read",
            Message::Value { .. } => "value",
            Message::Error { .. } => "error",
            Message::Event { .. } => "event",
            Message::Ready => "ready",
        }
    }
}

/// Payload of a successful reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplyData {
    /// Bytes written or sent
    Count(usize),
    /// Bytes read
    Bytes(Vec<u8>),
    /// Acknowledgement with no payload
    Ack,
}

impl ReplyData {
    /// Short name of the variant, for error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            ReplyData::Count(_) => "count",
            ReplyData::Bytes(_) => "bytes",
            ReplyData::Ack => "ack",
        }
    }
}

/// Unsolicited event raised by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data", rename_all = "camelCase")]
pub enum HardwareEvent {
    /// One input report
    Data(Vec<u8>),
    /// The device failed outside of any request
    Error(RemoteError),
}

/// Newline-delimited JSON codec
#[derive(Debug, Clone, Copy)]
pub struct MessageCodec {
    max_message_size: usize,
}

impl MessageCodec {
    /// Create a new codec with default settings
    pub fn new() -> Self {
        Self {
            max_message_size: 16 * 1024 * 1024, // 16 MB
        }
    }

    /// Create a codec with custom max message size
    pub fn with_max_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    /// Check if a message size is valid
    pub fn is_valid_size(&self, size: usize) -> bool {
        size > 0 && size <= self.max_message_size
    }

    /// Encode one message as a newline-terminated JSON line.
    pub fn encode_line(&self, message: &Message) -> IpcResult<Vec<u8>> {
        let mut line =
            serde_json::to_vec(message).map_err(|e| IpcError::EncodingFailed(e.to_string()))?;
        if !self.is_valid_size(line.len()) {
            return Err(IpcError::EncodingFailed(format!(
                "Message size {} exceeds maximum {}",
                line.len(),
                self.max_message_size
            )));
        }
        line.push(b'\n');
        Ok(line)
    }

    /// Decode one line. A trailing `\n` or `\r\n` is ignored.
    pub fn decode_line(&self, line: &[u8]) -> IpcResult<Message> {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if !self.is_valid_size(line.len()) {
            return Err(IpcError::DecodingFailed(format!(
                "Message size {} is empty or exceeds maximum {}",
                line.len(),
                self.max_message_size
            )));
        }
        serde_json::from_slice(line).map_err(|e| IpcError::DecodingFailed(e.to_string()))
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}
