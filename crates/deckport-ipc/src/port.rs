//! Message ports
//!
//! A [`MessagePort`] is one end of a bidirectional message channel. Posting
//! sends a message to the peer; subscribers see every message the peer
//! sends. Listeners run on whichever thread delivers the message (the
//! caller's thread for in-process pairs, the reader task for the offload
//! process, the worker thread for the worker transport), so they must be
//! short and must not block.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam::channel::Sender;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use crate::codec::{Message, MessageCodec};
use crate::error::{IpcError, IpcResult};

/// Callback invoked for every incoming message.
pub type Listener = Arc<dyn Fn(&Message) + Send + Sync>;

/// Handle returned by [`MessagePort::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// One end of a message channel.
pub trait MessagePort: Send + Sync {
    /// Send a message to the peer.
    fn post_message(&self, message: Message) -> IpcResult<()>;

    /// Register a listener for messages from the peer.
    fn subscribe(&self, listener: Listener) -> ListenerId;

    /// Remove a listener. Returns false if it was not registered.
    fn unsubscribe(&self, id: ListenerId) -> bool;

    /// False once the peer is known to be gone.
    fn is_connected(&self) -> bool {
        true
    }
}

/// Listener registry shared between a port and whatever delivers to it.
#[derive(Default)]
pub struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Listener)>>,
}

impl Listeners {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((id, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    /// Deliver to every listener. The registry lock is not held while
    /// listeners run, so a listener may post, subscribe or unsubscribe.
    pub fn dispatch(&self, message: &Message) {
        let snapshot: Vec<Listener> = self
            .entries
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        trace!(
            message_type = message.type_name(),
            listeners = snapshot.len(),
            "Dispatching message"
        );
        for listener in snapshot {
            listener(message);
        }
    }

    /// Drop every listener, releasing anything they captured.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.entries.lock());
        drop(drained);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where a [`ChannelPort`] sends posted messages.
pub enum Outbound {
    /// Deliver synchronously to the peer's listeners.
    Peer(Arc<Listeners>),
    /// Hand the message to a thread draining this queue.
    Queue(Sender<Message>),
    /// Encode as a JSON line on a blocking byte stream.
    Lines {
        writer: Mutex<Box<dyn Write + Send>>,
        codec: MessageCodec,
    },
    /// Encode as a JSON line and queue it for an async writer task. Posting
    /// never waits on the stream.
    Pipe {
        tx: UnboundedSender<Vec<u8>>,
        codec: MessageCodec,
    },
}

impl Outbound {
    pub fn lines(writer: Box<dyn Write + Send>) -> Self {
        Outbound::Lines {
            writer: Mutex::new(writer),
            codec: MessageCodec::new(),
        }
    }

    pub fn pipe(tx: UnboundedSender<Vec<u8>>) -> Self {
        Outbound::Pipe {
            tx,
            codec: MessageCodec::new(),
        }
    }
}

/// A [`MessagePort`] built from a listener registry and an outbound path.
pub struct ChannelPort {
    listeners: Arc<Listeners>,
    outbound: Outbound,
    closed: Arc<AtomicBool>,
}

impl ChannelPort {
    pub fn new(listeners: Arc<Listeners>, outbound: Outbound) -> Self {
        Self {
            listeners,
            outbound,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share the closed flag with whatever detects the peer going away.
    pub fn with_closed_flag(mut self, closed: Arc<AtomicBool>) -> Self {
        self.closed = closed;
        self
    }

    pub fn listeners(&self) -> &Arc<Listeners> {
        &self.listeners
    }

    /// Mark the peer as gone. Later posts fail with `ChannelClosed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl MessagePort for ChannelPort {
    fn post_message(&self, message: Message) -> IpcResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(IpcError::ChannelClosed);
        }
        match &self.outbound {
            Outbound::Peer(peer) => {
                peer.dispatch(&message);
                Ok(())
            }
            Outbound::Queue(tx) => tx.send(message).map_err(|_unsent| {
                self.close();
                IpcError::ChannelClosed
            }),
            Outbound::Lines { writer, codec } => {
                let line = codec.encode_line(&message)?;
                let mut writer = writer.lock();
                writer
                    .write_all(&line)
                    .and_then(|()| writer.flush())
                    .map_err(|e| {
                        if e.kind() == std::io::ErrorKind::BrokenPipe {
                            self.close();
                            IpcError::ChannelClosed
                        } else {
                            IpcError::Io(e)
                        }
                    })
            }
            Outbound::Pipe { tx, codec } => {
                let line = codec.encode_line(&message)?;
                tx.send(line).map_err(|_writer_gone| {
                    self.close();
                    IpcError::ChannelClosed
                })
            }
        }
    }

    fn subscribe(&self, listener: Listener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

/// Two ports wired to each other; posting on one delivers on the other,
/// synchronously, on the posting thread.
pub fn in_process_pair() -> (Arc<ChannelPort>, Arc<ChannelPort>) {
    let left = Listeners::new();
    let right = Listeners::new();
    let a = ChannelPort::new(Arc::clone(&left), Outbound::Peer(Arc::clone(&right)));
    let b = ChannelPort::new(right, Outbound::Peer(left));
    (Arc::new(a), Arc::new(b))
}
