//! Client-side device sessions
//!
//! A [`DeviceSession`] turns calls on one device path into correlated
//! request messages. Each call posts its request immediately and returns a
//! [`Reply`] that settles when the executor answers. Nothing times out; pass
//! a [`CancelSignal`] to abandon waiting calls.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use futures::future::{Either, select};
use tokio::sync::{Notify, mpsc};
use tracing::{debug, error, warn};

use crate::codec::{HardwareEvent, Message, ReplyData};
use crate::context::{Release, Routing};
use crate::error::{IpcError, IpcResult};
use crate::port::MessagePort;

/// The eventual result of one session call.
pub struct Reply<T> {
    inner: Pin<Box<dyn Future<Output = IpcResult<T>> + Send>>,
}

impl<T: Send + 'static> Reply<T> {
    fn new(future: impl Future<Output = IpcResult<T>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(future),
        }
    }

    /// A reply that is already settled.
    pub fn ready(result: IpcResult<T>) -> Self {
        Self::new(std::future::ready(result))
    }
}

impl<T> Future for Reply<T> {
    type Output = IpcResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<T> std::fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reply").finish_non_exhaustive()
    }
}

/// Result of [`DeviceSession::close`].
#[derive(Debug)]
pub enum CloseOutcome {
    /// The session was not open
    NotOpen,
    /// Other sessions still hold the device open
    Released,
    /// This was the last reference; resolves `true` once the executor has
    /// closed the handle
    Teardown(Reply<bool>),
}

/// Externally fired cancellation for a session's pending calls.
#[derive(Clone, Default)]
pub struct CancelSignal {
    inner: Arc<CancelState>,
}

#[derive(Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Completes once [`CancelSignal::cancel`] has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelSignal")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

pub struct DeviceSession {
    path: String,
    port: Arc<dyn MessagePort>,
    routing: Arc<Routing>,
    is_open: AtomicBool,
    cancel: Option<CancelSignal>,
}

impl DeviceSession {
    pub(crate) fn new(path: impl Into<String>, port: Arc<dyn MessagePort>, routing: Arc<Routing>) -> Self {
        Self {
            path: path.into(),
            port,
            routing,
            is_open: AtomicBool::new(false),
            cancel: None,
        }
    }

    pub fn with_cancel_signal(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }

    /// Take a reference to the device. Only the first reference across the
    /// context registers it with the executor. Returns `false` if this
    /// session was already open.
    pub fn open(&self) -> IpcResult<bool> {
        if self.is_open.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        let registered = self.routing.acquire(&self.path, || {
            debug!(path = %self.path, "Registering device");
            self.port.post_message(Message::Register {
                path: self.path.clone(),
            })
        });
        if let Err(e) = registered {
            error!(path = %self.path, error = %e, "Failed to register device");
            self.is_open.store(false, Ordering::SeqCst);
            return Err(e);
        }
        Ok(true)
    }

    /// Drop this session's reference. Only the last reference across the
    /// context closes the device.
    pub fn close(&self) -> CloseOutcome {
        if !self.is_open.swap(false, Ordering::SeqCst) {
            return CloseOutcome::NotOpen;
        }
        let teardown = self.routing.release(&self.path, || {
            debug!(path = %self.path, "Closing device");
            self.request(
                |correlation_id| Message::Close {
                    path: self.path.clone(),
                    correlation_id: Some(correlation_id),
                },
                expect_ack,
            )
        });
        match teardown {
            Release::Shared => CloseOutcome::Released,
            Release::Last(reply) => CloseOutcome::Teardown(reply),
        }
    }

    pub fn read(&self) -> Reply<Vec<u8>> {
        self.request(
            |correlation_id| Message::Read {
                path: self.path.clone(),
                correlation_id,
            },
            expect_bytes,
        )
    }

    pub fn write(&self, data: Vec<u8>) -> Reply<usize> {
        self.write_multi(vec![data])
    }

    /// Write several reports back to back as one request.
    pub fn write_multi(&self, data: Vec<Vec<u8>>) -> Reply<usize> {
        self.request(
            |correlation_id| Message::Write {
                path: self.path.clone(),
                correlation_id,
                data,
            },
            expect_count,
        )
    }

    pub fn send_feature_report(&self, data: Vec<u8>) -> Reply<usize> {
        self.request(
            |correlation_id| Message::FeatureReport {
                path: self.path.clone(),
                correlation_id,
                data,
            },
            expect_count,
        )
    }

    /// Hardware events for this session's path.
    pub fn events(&self) -> mpsc::UnboundedReceiver<HardwareEvent> {
        self.routing.subscribe_events(&self.path)
    }

    fn request<T: Send + 'static>(
        &self,
        build: impl FnOnce(u32) -> Message,
        expect: fn(ReplyData) -> IpcResult<T>,
    ) -> Reply<T> {
        let (correlation_id, rx) = self.routing.allocate();
        let message = build(correlation_id);
        debug!(
            path = %self.path,
            correlation_id,
            message_type = message.type_name(),
            "Posting request"
        );
        if let Err(e) = self.port.post_message(message) {
            self.routing.forget(correlation_id);
            warn!(path = %self.path, correlation_id, error = %e, "Failed to post request");
            return Reply::ready(Err(e));
        }

        let routing = Arc::clone(&self.routing);
        let cancel = self.cancel.clone();
        Reply::new(async move {
            let settled = match cancel {
                None => rx.await,
                Some(signal) => match select(rx, Box::pin(signal.cancelled())).await {
                    Either::Left((settled, _)) => settled,
                    Either::Right(((), _)) => {
                        routing.forget(correlation_id);
                        return Err(IpcError::Cancelled);
                    }
                },
            };
            match settled {
                Ok(outcome) => outcome.and_then(expect),
                Err(_dropped) => Err(IpcError::ChannelClosed),
            }
        })
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if !self.is_open.swap(false, Ordering::SeqCst) {
            return;
        }
        let path = &self.path;
        let port = &self.port;
        let released = self.routing.release(path, || {
            port.post_message(Message::Close {
                path: path.clone(),
                correlation_id: None,
            })
        });
        if let Release::Last(Err(e)) = released {
            warn!(path = %path, error = %e, "Failed to close device on drop");
        }
    }
}

fn expect_count(data: ReplyData) -> IpcResult<usize> {
    match data {
        ReplyData::Count(count) => Ok(count),
        other => Err(IpcError::UnexpectedReply(format!(
            "expected count, got {}",
            other.shape()
        ))),
    }
}

fn expect_bytes(data: ReplyData) -> IpcResult<Vec<u8>> {
    match data {
        ReplyData::Bytes(bytes) => Ok(bytes),
        other => Err(IpcError::UnexpectedReply(format!(
            "expected bytes, got {}",
            other.shape()
        ))),
    }
}

fn expect_ack(data: ReplyData) -> IpcResult<bool> {
    match data {
        ReplyData::Ack => Ok(true),
        other => Err(IpcError::UnexpectedReply(format!(
            "expected ack, got {}",
            other.shape()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::in_process_pair;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_expect_helpers() {
        assert!(matches!(expect_count(ReplyData::Count(4)), Ok(4)));
        assert!(matches!(
            expect_count(ReplyData::Ack),
            Err(IpcError::UnexpectedReply(ref msg)) if msg == "expected count, got ack"
        ));
        assert!(matches!(expect_bytes(ReplyData::Bytes(vec![1])), Ok(ref b) if b == &[1]));
        assert!(matches!(expect_ack(ReplyData::Ack), Ok(true)));
    }

    #[tokio::test]
    async fn test_cancel_signal_wakes_waiters() -> Result<(), tokio::task::JoinError> {
        let signal = CancelSignal::new();
        let waiter = signal.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });
        tokio::task::yield_now().await;
        signal.cancel();
        task.await?;
        assert!(signal.is_cancelled());
        Ok(())
    }

    #[tokio::test]
    async fn test_cancelled_before_waiting_returns_immediately() {
        let signal = CancelSignal::new();
        signal.cancel();
        signal.cancelled().await;
    }

    #[tokio::test]
    async fn test_ready_reply() {
        let reply: Reply<usize> = Reply::ready(Ok(7));
        assert!(matches!(reply.await, Ok(7)));
    }

    #[test]
    fn test_reply_is_pending_until_the_executor_answers() -> IpcResult<()> {
        let (client, executor) = in_process_pair();
        let routing = Arc::new(Routing::default());
        client.subscribe(Routing::listener(&routing));
        let session = DeviceSession::new("/dev/hidraw0", client, Arc::clone(&routing));

        // Nothing listens on the executor side, so the write goes unanswered.
        let mut write = task::spawn(session.write(vec![1, 2, 3]));
        assert_pending!(write.poll());
        assert_eq!(routing.pending.lock().len(), 1);

        executor.post_message(Message::Value {
            path: "/dev/hidraw0".to_string(),
            correlation_id: 0,
            data: ReplyData::Count(3),
        })?;
        assert!(write.is_woken());
        let written = assert_ready!(write.poll())?;
        assert_eq!(written, 3);
        assert!(routing.pending.lock().is_empty());
        Ok(())
    }
}
