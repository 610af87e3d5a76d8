use crate::error::Error;
use async_trait::async_trait;

/// Which substrate a [`Service`] is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// POSIX-mq-style in-memory queues, single host, transient. Used by tests
    /// and by agents run without a configured NATS endpoint.
    Local,
    /// JetStream-style durable pub-sub. The production backend.
    Nats,
}

/// A connected handle to the messaging substrate. Construct with
/// [`crate::open`].
#[async_trait]
pub trait Service: Send + Sync {
    async fn create_publisher(
        &self,
        stream: &str,
        consumer: &str,
        subject: &str,
    ) -> Result<Box<dyn Publisher>, Error>;

    async fn create_subscriber(
        &self,
        stream: &str,
        consumer: &str,
        subject: &str,
    ) -> Result<Box<dyn Subscriber>, Error>;
}

/// A single-owner handle bound to `(stream, consumer, subject)`. Crossing-task
/// use requires external synchronization (`&mut self` enforces this within a
/// single owner; sharing across tasks needs a `Mutex` at the call site).
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Encodes and publishes `payload`, attaching a fresh dedup id and
    /// retrying transient broker failures per the policy in
    /// [`crate::retry::PublishFailure`]. Returns the dedup id that was
    /// ultimately accepted.
    async fn send(&mut self, payload: &[u8]) -> Result<String, Error>;
}

/// A single-owner handle over a durable consumer cursor.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Pull-fetches one message with a 5-second deadline, retrying broker
    /// errors until one arrives, acknowledges it, and returns its raw
    /// payload. Decoding is the caller's responsibility.
    async fn receive(&mut self) -> Result<Vec<u8>, Error>;
}
