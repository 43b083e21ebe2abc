//! Key and error events raised by an open panel

use std::sync::Arc;

use deckport_ipc::{HardwareEvent, RemoteError};
use hid_streamdeck_protocol::{KeyEvent, KeyState};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum DeckEvent {
    Down(usize),
    Up(usize),
    Error(RemoteError),
}

impl From<KeyEvent> for DeckEvent {
    fn from(event: KeyEvent) -> Self {
        match event {
            KeyEvent::Down(key) => DeckEvent::Down(key),
            KeyEvent::Up(key) => DeckEvent::Up(key),
        }
    }
}

#[derive(Default)]
pub(crate) struct Subscribers {
    senders: Mutex<Vec<mpsc::UnboundedSender<DeckEvent>>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<DeckEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().push(tx);
        rx
    }

    /// Deliver to every live subscriber. Returns `false` if nobody got it.
    pub(crate) fn publish(&self, event: &DeckEvent) -> bool {
        let mut senders = self.senders.lock();
        senders.retain(|tx| tx.send(event.clone()).is_ok());
        !senders.is_empty()
    }
}

/// Fold the session's hardware events into key state and fan the resulting
/// transitions out to subscribers.
pub(crate) fn spawn_event_pump(
    path: String,
    mut events: mpsc::UnboundedReceiver<HardwareEvent>,
    key_state: Arc<Mutex<KeyState>>,
    subscribers: Arc<Subscribers>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                HardwareEvent::Data(report) => {
                    let transitions = key_state.lock().apply_report(&report);
                    for transition in transitions {
                        trace!(path = %path, ?transition, "Key transition");
                        subscribers.publish(&DeckEvent::from(transition));
                    }
                }
                HardwareEvent::Error(e) => {
                    if !subscribers.publish(&DeckEvent::Error(e.clone())) {
                        error!(path = %path, error = %e, "Hardware error with no subscriber");
                    }
                }
            }
        }
        debug!(path = %path, "Event stream ended");
    })
}
