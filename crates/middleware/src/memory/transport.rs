use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::TransportError;
use crate::subject;
use crate::transport::{Subscription, Transport, TransportMessage};

const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Snapshot of hub activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HubStats {
    pub open_transports: usize,
    pub active_subscriptions: usize,
    /// Patterns with at least one live subscription
    pub patterns: usize,
    pub published: u64,
}

/// In-process message bus shared by every `InMemoryTransport` created on it.
///
/// Two sessions that load the memory bridge over the same hub see each
/// other's messages, as two processes connected to one broker would.
pub struct MemoryHub {
    /// One broadcast channel per subscription pattern
    channels: DashMap<String, broadcast::Sender<TransportMessage>>,
    published: AtomicU64,
    open_transports: AtomicUsize,
    active_subscriptions: AtomicUsize,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            channels: DashMap::new(),
            published: AtomicU64::new(0),
            open_transports: AtomicUsize::new(0),
            active_subscriptions: AtomicUsize::new(0),
        })
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            open_transports: self.open_transports.load(Ordering::SeqCst),
            active_subscriptions: self.active_subscriptions.load(Ordering::SeqCst),
            patterns: self.channels.len(),
            published: self.published.load(Ordering::SeqCst),
        }
    }

    /// Receiver on the channel for `pattern`, created under the entry lock
    /// so a concurrent `release_channel` cannot orphan it
    fn subscribe_channel(&self, pattern: &str) -> broadcast::Receiver<TransportMessage> {
        self.channels
            .entry(pattern.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_BUFFER_SIZE).0)
            .subscribe()
    }

    /// Drop the channel for `pattern` once `remaining` is its only receiver
    fn release_channel(&self, pattern: &str, remaining: usize) {
        self.channels
            .remove_if(pattern, |_, tx| tx.receiver_count() <= remaining);
    }

    fn publish(&self, subject: &str, payload: Bytes) {
        self.published.fetch_add(1, Ordering::SeqCst);
        for entry in self.channels.iter() {
            if !subject::matches(entry.key(), subject) {
                continue;
            }
            let msg = TransportMessage {
                subject: subject.to_string(),
                payload: payload.clone(),
            };
            // No receivers on this pattern is not an error for direct messages
            let _ = entry.value().send(msg);
        }
    }
}

pub struct InMemoryTransport {
    name: String,
    hub: Arc<MemoryHub>,
    closed: AtomicBool,
}

impl InMemoryTransport {
    pub fn new(name: impl Into<String>, hub: Arc<MemoryHub>) -> Self {
        hub.open_transports.fetch_add(1, Ordering::SeqCst);
        Self {
            name: name.into(),
            hub,
            closed: AtomicBool::new(false),
        }
    }

    pub fn hub(&self) -> &Arc<MemoryHub> {
        &self.hub
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

impl Drop for InMemoryTransport {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.hub.open_transports.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

struct InMemorySubscription {
    pattern: String,
    rx: broadcast::Receiver<TransportMessage>,
    hub: Arc<MemoryHub>,
}

impl Drop for InMemorySubscription {
    fn drop(&mut self) {
        // `self.rx` is still alive here and counts as one receiver
        self.hub.release_channel(&self.pattern, 1);
        self.hub.active_subscriptions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next(&mut self) -> Result<TransportMessage, TransportError> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Lagged(n) => TransportError::Lagged(n),
            broadcast::error::RecvError::Closed => TransportError::Closed,
        })
    }

    async fn unsubscribe(self: Box<Self>) -> Result<(), TransportError> {
        debug!(pattern = %self.pattern, "memory unsubscribe");
        Ok(())
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError> {
        self.ensure_open()?;
        subject::validate_topic(subject)?;
        self.hub.publish(subject, payload);
        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn Subscription>, TransportError> {
        self.ensure_open()?;
        subject::validate_pattern(pattern)?;
        let rx = self.hub.subscribe_channel(pattern);
        self.hub.active_subscriptions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemorySubscription {
            pattern: pattern.to_string(),
            rx,
            hub: Arc::clone(&self.hub),
        }))
    }

    async fn flush(&self) -> Result<(), TransportError> {
        self.ensure_open()
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.hub.open_transports.fetch_sub(1, Ordering::SeqCst);
        debug!(transport = %self.name, "memory transport closed");
        Ok(())
    }
}
