//! Topic publisher
//!
//! A publisher is bound to one transport and one topic. Clones share the
//! same handle, so destroying it through any clone disables all of them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::MiddlewareError;
use crate::gate::ActivationGate;
use crate::message::Message;
use crate::subject;
use crate::transport::Transport;

struct PublisherInner {
    topic: String,
    transport: Arc<dyn Transport>,
    gate: ActivationGate,
    sent: AtomicU64,
}

#[derive(Clone)]
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

impl Publisher {
    pub fn create(transport: Arc<dyn Transport>, topic: &str) -> Result<Self, MiddlewareError> {
        subject::validate_topic(topic)
            .map_err(|e| MiddlewareError::Allocation(format!("publisher for '{}': {}", topic, e)))?;
        debug!(topic = %topic, transport = %transport.name(), "Publisher created");
        Ok(Self {
            inner: Arc::new(PublisherInner {
                topic: topic.to_string(),
                transport,
                gate: ActivationGate::new(),
                sent: AtomicU64::new(0),
            }),
        })
    }

    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    /// Messages sent successfully so far
    pub fn sent(&self) -> u64 {
        self.inner.sent.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.inner.gate.is_active()
    }

    /// Encode and send one message. Does not wait for any subscriber.
    pub async fn send(&self, msg: &Message) -> Result<(), MiddlewareError> {
        if !self.is_active() {
            return Err(MiddlewareError::InvalidState(format!(
                "publisher for '{}' was destroyed",
                self.inner.topic
            )));
        }
        let payload = msg.encode()?;
        self.inner
            .transport
            .publish(&self.inner.topic, payload)
            .await
            .map_err(|e| MiddlewareError::Send(format!("{}: {}", self.inner.topic, e)))?;
        self.inner.sent.fetch_add(1, Ordering::SeqCst);
        trace!(topic = %self.inner.topic, fields = msg.len(), "Message sent");
        Ok(())
    }

    /// Returns false if the publisher was already destroyed
    pub fn destroy(&self) -> bool {
        let closed = self.inner.gate.deactivate();
        if closed {
            debug!(topic = %self.inner.topic, "Publisher destroyed");
        }
        closed
    }
}
