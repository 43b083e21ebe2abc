//! Transport and executor settings

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Settings consumed by the transports and the executor side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub offload: OffloadConfig,
    pub container: ContainerConfig,
}

/// How the offload child process is launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffloadConfig {
    /// Executable to spawn. When unset, `DECKPORT_OFFLOAD_BIN` is consulted,
    /// then `deckport-offload` next to the current executable.
    pub program: Option<PathBuf>,
    /// Extra arguments appended after the container flags.
    pub args: Vec<String>,
    /// How long to wait for the child's `ready` message.
    pub handshake_timeout_ms: u64,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            handshake_timeout_ms: 5_000,
        }
    }
}

/// Per-device executor behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Run an input pump that forwards input reports as events.
    pub forward_input: bool,
    /// Input pump read timeout, in milliseconds.
    pub poll_interval_ms: u32,
    /// Timeout for explicit `read` requests; 0 polls, -1 blocks.
    pub read_timeout_ms: i32,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            forward_input: true,
            poll_interval_ms: 5,
            read_timeout_ms: 0,
        }
    }
}

impl ContainerConfig {
    /// The pump's read timeout as the signed value hidapi expects.
    pub fn poll_timeout(&self) -> i32 {
        i32::try_from(self.poll_interval_ms.max(1)).unwrap_or(i32::MAX)
    }
}
