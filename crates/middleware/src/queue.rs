//! Event queue and dispatcher
//!
//! Timers and subscriptions push events onto a queue; a single dispatcher
//! loop pops them and awaits the matching callback. Callbacks therefore never
//! run concurrently with each other, and application state they touch needs
//! no locking beyond what `Send + Sync` requires.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::select;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, trace};

use crate::error::MiddlewareError;
use crate::gate::ActivationGate;
use crate::message::Message;
use crate::subscription::SubscriptionInfo;
use crate::timer::TimerInfo;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_handle_id() -> u64 {
    NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Hooks invoked on the dispatcher for one subscription
#[async_trait]
pub trait SubscriptionCallbacks: Send + Sync {
    /// Subscription is live
    async fn on_create(&self, _subscription: &SubscriptionInfo) {}

    /// Asynchronous failure; the subscription stays alive
    async fn on_error(&self, subscription: &SubscriptionInfo, error: &MiddlewareError);

    /// Message received on `subject` (the concrete topic, not the pattern)
    async fn on_msg(&self, subscription: &SubscriptionInfo, subject: &str, msg: &Message);
}

/// Hook invoked on the dispatcher each time a timer fires
#[async_trait]
pub trait TimerCallback: Send + Sync {
    async fn on_tick(&self, timer: &TimerInfo);
}

pub(crate) struct SubscriptionTarget {
    pub info: Arc<SubscriptionInfo>,
    pub gate: Arc<ActivationGate>,
    pub callbacks: Arc<dyn SubscriptionCallbacks>,
}

impl Clone for SubscriptionTarget {
    fn clone(&self) -> Self {
        Self {
            info: Arc::clone(&self.info),
            gate: Arc::clone(&self.gate),
            callbacks: Arc::clone(&self.callbacks),
        }
    }
}

pub(crate) enum Event {
    Timer {
        info: Arc<TimerInfo>,
        gate: Arc<ActivationGate>,
        callback: Arc<dyn TimerCallback>,
    },
    SubscriptionCreated(SubscriptionTarget),
    SubscriptionError(SubscriptionTarget, MiddlewareError),
    Message {
        target: SubscriptionTarget,
        subject: String,
        msg: Message,
    },
}

impl Event {
    fn gate(&self) -> &ActivationGate {
        match self {
            Event::Timer { gate, .. } => gate,
            Event::SubscriptionCreated(target)
            | Event::SubscriptionError(target, _)
            | Event::Message { target, .. } => &target.gate,
        }
    }
}

/// Requests the dispatcher loop to return
#[derive(Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Ask the dispatcher to stop. Safe to call from any task, any number of times.
    pub fn request_stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.tx.borrow()
    }
}

struct QueueInner {
    name: String,
    tx: mpsc::UnboundedSender<Event>,
    rx: Mutex<mpsc::UnboundedReceiver<Event>>,
    stop: StopHandle,
    dispatched: AtomicU64,
    dropped: AtomicU64,
}

/// Cloneable handle to one event queue
#[derive(Clone)]
pub struct EventQueue {
    inner: Arc<QueueInner>,
}

impl EventQueue {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(QueueInner {
                name: name.into(),
                tx,
                rx: Mutex::new(rx),
                stop: StopHandle {
                    tx: Arc::new(stop_tx),
                },
                dispatched: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.inner.stop.clone()
    }

    /// Callbacks run so far
    pub fn dispatched(&self) -> u64 {
        self.inner.dispatched.load(Ordering::SeqCst)
    }

    /// Events discarded because their handle was already destroyed
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::SeqCst)
    }

    pub(crate) fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.inner.tx.clone()
    }

    /// Run callbacks until a stop is requested.
    ///
    /// Returns immediately if a stop was already requested. Events still
    /// queued at stop time are left in the queue.
    pub async fn dispatch(&self) {
        let mut rx = self.inner.rx.lock().await;
        let mut stop = self.inner.stop.tx.subscribe();
        info!(queue = %self.inner.name, "Dispatcher started");

        loop {
            if *stop.borrow_and_update() {
                break;
            }
            select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                event = rx.recv() => {
                    match event {
                        Some(event) => self.deliver(event).await,
                        None => break,
                    }
                }
            }
        }

        info!(
            queue = %self.inner.name,
            dispatched = self.dispatched(),
            "Dispatcher stopped"
        );
    }

    async fn deliver(&self, event: Event) {
        if !event.gate().is_active() {
            self.inner.dropped.fetch_add(1, Ordering::SeqCst);
            trace!(queue = %self.inner.name, "Dropping event for destroyed handle");
            return;
        }

        match event {
            Event::Timer { info, callback, .. } => {
                callback.on_tick(&info).await;
            }
            Event::SubscriptionCreated(target) => {
                debug!(topic = %target.info.topic, "Subscription created");
                target.callbacks.on_create(&target.info).await;
            }
            Event::SubscriptionError(target, error) => {
                target.callbacks.on_error(&target.info, &error).await;
            }
            Event::Message {
                target,
                subject,
                msg,
            } => {
                target.callbacks.on_msg(&target.info, &subject, &msg).await;
            }
        }
        self.inner.dispatched.fetch_add(1, Ordering::SeqCst);
    }
}
