//! Prelude module for convenient imports

pub use crate::config::DeckportConfig;
pub use crate::deck::StreamDeck;
pub use crate::error::{DeckError, DeckResult, SelectionError};
pub use crate::events::DeckEvent;
pub use crate::select::{DeckDevice, select_all_devices, select_device};
pub use deckport_ipc::{TransportContext, TransportKind};
pub use hid_streamdeck_protocol::{DeckCapabilities, DeckModel};
