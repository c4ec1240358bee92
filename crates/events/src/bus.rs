//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus is the notification path between the purchase state store and its
//! observers (UI projections, SSE clients, tests).
//!
//! - **Non-blocking publish**: publishing never waits on a subscriber, so a slow
//!   observer cannot stall the writer.
//! - **Broadcast semantics**: each subscription receives every message published
//!   after it subscribed.
//! - **Publisher order**: a subscription receives messages in the order the
//!   publisher sent them. The store publishes under its write lock, which makes
//!   per-product order equal to application order.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to an event stream.
///
/// ## Usage Pattern
///
/// ```ignore
/// let subscription = store.subscribe();
///
/// loop {
///     match subscription.recv_timeout(Duration::from_secs(1)) {
///         Ok(envelope) => render(envelope),
///         Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
///         Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
///     }
/// }
/// ```
///
/// Subscriptions are designed for single-threaded consumption. From async code,
/// drain them on a blocking task (`tokio::task::spawn_blocking`).
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

    /// Drain everything currently queued without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// ## Error Handling
///
/// `publish()` can fail (e.g. internal lock poisoning). The state store treats a
/// failed publish as an observability problem: the state change itself has
/// already been applied and stays applied.
///
/// ## Thread Safety
///
/// The trait requires `Send + Sync`; implementations are shared across tasks.
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
