//! Subscriber callbacks

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use pubsub_middleware::{Message, MiddlewareError, SubscriptionCallbacks, SubscriptionInfo};
use tracing::{error, info, warn};

use crate::fields::TIMESTAMP_FIELD;

/// Logs every message's type, topic and timestamp field
#[derive(Debug, Default)]
pub struct TopicPrinter {
    received: AtomicU64,
    errors: AtomicU64,
}

impl TopicPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SubscriptionCallbacks for TopicPrinter {
    async fn on_create(&self, sub: &SubscriptionInfo) {
        info!(topic = %sub.topic, transport = %sub.transport, "Created subscription to topic");
    }

    async fn on_error(&self, sub: &SubscriptionInfo, error: &MiddlewareError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        error!(
            topic = %sub.topic,
            status = %error.status(),
            error = %error,
            "Error on subscription"
        );
    }

    async fn on_msg(&self, sub: &SubscriptionInfo, subject: &str, msg: &Message) {
        self.received.fetch_add(1, Ordering::Relaxed);
        match msg.get_field_as_string(TIMESTAMP_FIELD.name, TIMESTAMP_FIELD.fid) {
            Some(timestamp) => info!(
                msg_type = %msg.msg_type(),
                topic = %subject,
                subscription = %sub.topic,
                timestamp = %timestamp,
                "Message received"
            ),
            None => warn!(
                msg_type = %msg.msg_type(),
                topic = %subject,
                subscription = %sub.topic,
                "Message received without {}",
                TIMESTAMP_FIELD.name
            ),
        }
    }
}
