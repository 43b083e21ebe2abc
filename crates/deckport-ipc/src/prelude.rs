//! Prelude module for convenient imports

pub use crate::codec::{HardwareEvent, Message, MessageCodec, ReplyData};
pub use crate::config::{ContainerConfig, OffloadConfig, TransportConfig};
pub use crate::context::TransportContext;
pub use crate::error::{IpcError, IpcResult, RemoteError};
pub use crate::port::{MessagePort, in_process_pair};
pub use crate::session::{CancelSignal, CloseOutcome, DeviceSession, Reply};
pub use crate::transport::{Transport, TransportKind, transport_for};
