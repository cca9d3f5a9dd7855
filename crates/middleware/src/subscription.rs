use std::sync::Arc;

use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{MiddlewareError, TransportError};
use crate::gate::ActivationGate;
use crate::message::Message;
use crate::queue::{next_handle_id, Event, EventQueue, SubscriptionCallbacks, SubscriptionTarget};
use crate::transport::{Subscription, Transport};

/// What callbacks know about the subscription they serve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub id: u64,
    /// Pattern the subscription was created with
    pub topic: String,
    pub transport: String,
}

/// Live subscription delivering to callbacks on an event queue.
///
/// Receive failures and undecodable payloads go to `on_error`; the
/// subscription keeps receiving afterwards.
pub struct SubscriptionHandle {
    info: Arc<SubscriptionInfo>,
    gate: Arc<ActivationGate>,
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub async fn create(
        transport: &Arc<dyn Transport>,
        queue: &EventQueue,
        topic: &str,
        callbacks: Arc<dyn SubscriptionCallbacks>,
    ) -> Result<Self, MiddlewareError> {
        let subscription = transport
            .subscribe(topic)
            .await
            .map_err(|e| MiddlewareError::Subscription(format!("{}: {}", topic, e)))?;

        let info = Arc::new(SubscriptionInfo {
            id: next_handle_id(),
            topic: topic.to_string(),
            transport: transport.name().to_string(),
        });
        let gate = Arc::new(ActivationGate::new());
        let target = SubscriptionTarget {
            info: Arc::clone(&info),
            gate: Arc::clone(&gate),
            callbacks,
        };

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(pump(subscription, queue.sender(), target, cancel_rx));

        debug!(subscription = info.id, topic = %topic, "Subscription allocated");
        Ok(Self {
            info,
            gate,
            cancel: Some(cancel_tx),
            task: Some(task),
        })
    }

    pub fn info(&self) -> &SubscriptionInfo {
        &self.info
    }

    pub fn topic(&self) -> &str {
        &self.info.topic
    }

    pub fn is_active(&self) -> bool {
        self.gate.is_active()
    }

    /// Stop delivery and unsubscribe from the transport
    pub async fn destroy(mut self) -> Result<(), MiddlewareError> {
        self.gate.deactivate();
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| MiddlewareError::Subscription(format!("receive task failed: {}", e)))?;
        }
        debug!(subscription = self.info.id, topic = %self.info.topic, "Subscription destroyed");
        Ok(())
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        // Dropping the cancel sender ends the pump too
        self.gate.deactivate();
    }
}

/// Forward transport deliveries into the event queue until cancelled
async fn pump(
    mut subscription: Box<dyn Subscription>,
    tx: mpsc::UnboundedSender<Event>,
    target: SubscriptionTarget,
    mut cancel: oneshot::Receiver<()>,
) {
    if tx.send(Event::SubscriptionCreated(target.clone())).is_err() {
        return;
    }

    loop {
        let event = select! {
            biased;
            _ = &mut cancel => break,
            received = subscription.next() => match received {
                Ok(tm) => match Message::decode(&tm.payload) {
                    Ok(msg) => Event::Message {
                        target: target.clone(),
                        subject: tm.subject,
                        msg,
                    },
                    Err(e) => {
                        warn!(topic = %tm.subject, error = %e, "Dropping undecodable message");
                        Event::SubscriptionError(target.clone(), e)
                    }
                },
                Err(TransportError::Closed) => {
                    let _ = tx.send(Event::SubscriptionError(
                        target.clone(),
                        MiddlewareError::Subscription("upstream closed".to_string()),
                    ));
                    break;
                }
                Err(e) => {
                    warn!(topic = %target.info.topic, error = %e, "Subscription receive error");
                    Event::SubscriptionError(target.clone(), e.into())
                }
            },
        };
        if tx.send(event).is_err() {
            break;
        }
    }

    if let Err(e) = subscription.unsubscribe().await {
        warn!(topic = %target.info.topic, error = %e, "Unsubscribe failed");
    }
}
