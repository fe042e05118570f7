//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes already-persisted events to consumers (projections,
//! the notification fan-out, workers). It is intentionally lightweight:
//!
//! - **Transport-agnostic**: in-memory channels today, a broker later.
//! - **At-least-once**: consumers must be idempotent.
//! - **No persistence**: the event store is the source of truth; if a publish
//!   fails, the events are still stored and can be republished.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to an event stream.
///
/// Each subscription gets a copy of every event published to the bus
/// (broadcast semantics). Designed for single-threaded consumption.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// Sits between the event store and event consumers:
///
/// ```text
/// Command → Event Store (append) → Event Bus (publish) → Consumers
///                                                           ├─ Projections
///                                                           └─ Notification fan-out
/// ```
///
/// `publish()` can fail; failures are surfaced to the caller (typically the
/// command dispatcher). Since events are already persisted, retrying the
/// publication is safe.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
