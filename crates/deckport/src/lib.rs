//! Async driver for Elgato Stream Deck panels
//!
//! `deckport` ties the pure protocol in `hid-streamdeck-protocol` to the
//! message-passing dispatch in `deckport-ipc`. A [`StreamDeck`] validates
//! every call, encodes key images into the model's report pages and sends
//! them through a [`DeviceSession`](deckport_ipc::DeviceSession); input
//! reports come back as edge-triggered [`DeckEvent`]s.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use deckport::prelude::*;
//! use deckport_hid_common::HidApiBackend;
//!
//! async fn run() -> DeckResult<()> {
//!     let config = DeckportConfig::from_env()?;
//!     let context = config.build_context(Arc::new(HidApiBackend::new()));
//!     let Some(deck) = StreamDeck::connect(&context, config.transport, None, None).await? else {
//!         return Ok(());
//!     };
//!
//!     deck.set_brightness(70).await?;
//!     deck.clear_all_keys().await?;
//!     let mut events = deck.subscribe();
//!     while let Some(event) = events.recv().await {
//!         if let DeckEvent::Down(key) = event {
//!             deck.fill_color(key, 255, 0, 0).await?;
//!         }
//!     }
//!     deck.close().await
//! }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod deck;
pub mod error;
pub mod events;
pub mod prelude;
pub mod select;

pub use config::DeckportConfig;
pub use deck::StreamDeck;
pub use error::{DeckError, DeckResult, SelectionError};
pub use events::DeckEvent;
pub use select::{DeckDevice, select_all_devices, select_device};

pub use hid_streamdeck_protocol::{DeckCapabilities, DeckModel};
