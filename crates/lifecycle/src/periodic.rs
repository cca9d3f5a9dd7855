//! Timer-driven publishing

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pubsub_middleware::{Message, MiddlewareError, Publisher, TimerCallback, TimerInfo, Transport};
use tracing::{error, info};

use crate::session::Session;

/// Builds the message sent on each tick
pub type MessageFactory = Box<dyn Fn() -> Result<Message, MiddlewareError> + Send + Sync>;

/// Sends one freshly built message per timer firing. A failed build or send
/// is reported and the timer keeps running.
pub struct PeriodicPublish {
    publisher: Publisher,
    build: MessageFactory,
}

impl PeriodicPublish {
    pub fn new(publisher: Publisher, build: MessageFactory) -> Self {
        Self { publisher, build }
    }
}

#[async_trait]
impl TimerCallback for PeriodicPublish {
    async fn on_tick(&self, timer: &TimerInfo) {
        let outcome = match (self.build)() {
            Ok(msg) => self.publisher.send(&msg).await.map(|_| msg),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(msg) => {
                info!(
                    topic = %self.publisher.topic(),
                    message = %msg,
                    "Message published"
                );
            }
            Err(e) => {
                error!(
                    timer = timer.id,
                    topic = %self.publisher.topic(),
                    status = %e.status(),
                    error = %e,
                    "Error publishing message"
                );
            }
        }
    }
}

impl Session {
    /// Create a publisher on `topic` and a timer that sends one message built
    /// by `build` every `interval`. The timer is acquired after the publisher
    /// and is therefore released before it.
    pub fn publish_periodically(
        &mut self,
        transport: &Arc<dyn Transport>,
        topic: &str,
        interval: Duration,
        build: MessageFactory,
    ) -> Result<Publisher, MiddlewareError> {
        let publisher = self.create_publisher(transport, topic)?;
        let callback = Arc::new(PeriodicPublish::new(publisher.clone(), build));
        self.create_timer(interval, callback)?;
        Ok(publisher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubsub_middleware::{InMemoryTransport, MemoryHub};

    #[tokio::test]
    async fn test_tick_sends_freshly_built_message() {
        let transport: Arc<dyn Transport> =
            Arc::new(InMemoryTransport::new("local", MemoryHub::new()));
        let mut sub = transport.subscribe("tutorial.topic").await.unwrap();
        let publisher = Publisher::create(Arc::clone(&transport), "tutorial.topic").unwrap();
        let callback = PeriodicPublish::new(
            publisher.clone(),
            Box::new(|| -> Result<Message, MiddlewareError> {
                let mut msg = Message::new();
                msg.add_string("MdMyTimestamp", 99, "Thu Jan  4 09:05:00 2024")?;
                Ok(msg)
            }),
        );
        let timer = TimerInfo {
            id: 1,
            interval: Duration::from_secs(3),
        };

        callback.on_tick(&timer).await;

        let received = Message::decode(&sub.next().await.unwrap().payload).unwrap();
        assert_eq!(received.to_string(), "MdMyTimestamp=Thu Jan  4 09:05:00 2024");
        assert_eq!(publisher.sent(), 1);
    }

    #[tokio::test]
    async fn test_failed_build_keeps_publisher_usable() {
        let transport: Arc<dyn Transport> =
            Arc::new(InMemoryTransport::new("local", MemoryHub::new()));
        let publisher = Publisher::create(Arc::clone(&transport), "tutorial.topic").unwrap();
        let callback = PeriodicPublish::new(
            publisher.clone(),
            Box::new(|| -> Result<Message, MiddlewareError> {
                Err(MiddlewareError::Codec("no clock".to_string()))
            }),
        );
        let timer = TimerInfo {
            id: 1,
            interval: Duration::from_secs(3),
        };

        callback.on_tick(&timer).await;
        assert_eq!(publisher.sent(), 0);
        assert!(publisher.is_active());
    }
}
