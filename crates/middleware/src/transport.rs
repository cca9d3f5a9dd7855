use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// Payload received on a concrete subject
#[derive(Debug, Clone)]
pub struct TransportMessage {
    pub subject: String,
    pub payload: Bytes,
}

/// Subscription handle for receiving messages
#[async_trait]
pub trait Subscription: Send + Sync {
    /// Receive next message (blocks until available)
    async fn next(&mut self) -> Result<TransportMessage, TransportError>;

    /// Unsubscribe and close
    async fn unsubscribe(self: Box<Self>) -> Result<(), TransportError>;
}

/// Transport abstraction for pub/sub messaging
#[async_trait]
pub trait Transport: Send + Sync {
    /// Name the transport was created under
    fn name(&self) -> &str;

    /// Publish a message (fire and forget)
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Subscribe to a subject pattern
    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn Subscription>, TransportError>;

    /// Push any buffered publishes to the broker
    async fn flush(&self) -> Result<(), TransportError>;

    /// Flush and close. Publishing or subscribing afterwards fails with `Closed`.
    async fn close(&self) -> Result<(), TransportError>;
}
