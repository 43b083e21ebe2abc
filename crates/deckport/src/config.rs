//! Facade configuration
//!
//! A JSON document selecting the transport plus the offload and container
//! sections handed to `deckport-ipc`:
//!
//! ```json
//! {
//!   "transport": "auto",
//!   "offload": { "program": null, "args": [], "handshake_timeout_ms": 5000 },
//!   "container": { "forward_input": true, "poll_interval_ms": 5, "read_timeout_ms": 0 }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use deckport_hid_common::HidBackend;
use deckport_ipc::process::OFFLOAD_BIN_ENV;
use deckport_ipc::{
    ContainerConfig, OffloadConfig, TransportConfig, TransportContext, TransportKind,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DeckError, DeckResult};

/// Overrides the configured transport kind.
pub const TRANSPORT_ENV: &str = "DECKPORT_TRANSPORT";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckportConfig {
    pub transport: TransportKind,
    pub offload: OffloadConfig,
    pub container: ContainerConfig,
}

impl DeckportConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub async fn load_from_path<P: AsRef<Path>>(path: P) -> DeckResult<Self> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await? {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: DeckportConfig = serde_json::from_str(&content)?;
        config.validate()?;
        debug!(path = %path.display(), transport = %config.transport, "Loaded config");
        Ok(config)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> DeckResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `DECKPORT_TRANSPORT` and `DECKPORT_OFFLOAD_BIN` on top of `self`.
    pub fn with_env_overrides(self) -> DeckResult<Self> {
        self.with_overrides(
            std::env::var(TRANSPORT_ENV).ok().as_deref(),
            std::env::var_os(OFFLOAD_BIN_ENV).map(PathBuf::from),
        )
    }

    fn with_overrides(
        mut self,
        transport: Option<&str>,
        offload_bin: Option<PathBuf>,
    ) -> DeckResult<Self> {
        if let Some(transport) = transport {
            self.transport = transport.parse()?;
        }
        if let Some(program) = offload_bin {
            self.offload.program = Some(program);
        }
        Ok(self)
    }

    pub fn validate(&self) -> DeckResult<()> {
        if self.container.poll_interval_ms == 0 {
            return Err(DeckError::InvalidConfig(
                "container.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        // -1 selects blocking reads.
        if self.container.read_timeout_ms < -1 {
            return Err(DeckError::InvalidConfig(format!(
                "container.read_timeout_ms must be -1 or greater, got {}",
                self.container.read_timeout_ms
            )));
        }
        if self.offload.handshake_timeout_ms == 0 {
            return Err(DeckError::InvalidConfig(
                "offload.handshake_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// The sections `deckport-ipc` consumes.
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            offload: self.offload.clone(),
            container: self.container.clone(),
        }
    }

    /// A fresh transport context over `backend` using these settings.
    pub fn build_context(&self, backend: Arc<dyn HidBackend>) -> Arc<TransportContext> {
        TransportContext::new(backend, self.transport_config())
    }
}
