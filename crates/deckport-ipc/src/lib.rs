//! Correlated async dispatch for blocking HID devices
//!
//! HID handles are blocking and not thread-safe. This crate moves them behind
//! an executor and talks to it with tagged messages, so callers on a tokio
//! runtime get futures instead of blocking calls.
//!
//! # Architecture
//!
//! - [`session`]: client-side [`DeviceSession`] per device path
//! - [`context`]: [`TransportContext`], the shared correlation, refcount and
//!   event state plus one cached port per transport kind
//! - [`transport`]: the [`Transport`] trait, [`TransportKind`] and the
//!   in-process transport
//! - [`worker`] / [`process`]: the worker-thread and offload-process
//!   transports
//! - [`executor`] / [`container`]: executor side, one container per device
//! - [`port`] / [`codec`]: message ports and the wire format
//!
//! # Transports
//!
//! - **process**: a `deckport-offload` child process, JSON lines over
//!   stdin/stdout
//! - **worker**: a dedicated executor thread
//! - **in-process**: the executor runs on the posting thread
//! - **auto**: process, falling back to in-process
//!
//! # Example
//!
//! ```no_run
//! use deckport_ipc::prelude::*;
//!
//! async fn blink(path: &str) -> IpcResult<()> {
//!     let context = TransportContext::global();
//!     let session = context.session(TransportKind::Auto, path).await?;
//!     session.open()?;
//!     let written = session.write(vec![0x02, 0x01]).await?;
//!     tracing::info!(written, "Wrote report");
//!     if let CloseOutcome::Teardown(reply) = session.close() {
//!         reply.await?;
//!     }
//!     Ok(())
//! }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codec;
pub mod config;
pub mod container;
pub mod context;
pub mod error;
pub mod executor;
pub mod port;
pub mod prelude;
pub mod process;
pub mod session;
pub mod transport;
pub mod worker;

pub use codec::{HardwareEvent, Message, MessageCodec, ReplyData};
pub use config::{ContainerConfig, OffloadConfig, TransportConfig};
pub use context::TransportContext;
pub use error::{IpcError, IpcResult, RemoteError};
pub use port::{Listener, ListenerId, MessagePort};
pub use process::run_offload_host;
pub use session::{CancelSignal, CloseOutcome, DeviceSession, Reply};
pub use transport::{Transport, TransportKind, transport_for};
