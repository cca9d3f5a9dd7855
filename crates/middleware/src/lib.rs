//! pubsub-middleware: Bridges, transports and the event queue
//!
//! Provides the handles a pub/sub client is built from: a bridge loaded by
//! name, transports created on it, publishers, subscriptions and timers, and
//! the dispatcher that runs their callbacks one at a time.

pub mod bridge;
pub mod error;
pub mod gate;
pub mod memory;
pub mod message;
pub mod nats;
pub mod publisher;
pub mod queue;
pub mod subject;
pub mod subscription;
pub mod timer;
pub mod transport;

pub use bridge::{Bridge, BridgeKind};
pub use error::{MiddlewareError, Status, TransportError};
pub use gate::ActivationGate;
pub use memory::{HubStats, InMemoryTransport, MemoryHub};
pub use message::{
    Field, FieldDescriptor, FieldValue, Message, MsgStatus, MsgType, MSG_STATUS_FIELD,
    MSG_TYPE_FIELD,
};
pub use nats::{NatsTransport, DEFAULT_NATS_URL};
pub use publisher::Publisher;
pub use queue::{EventQueue, StopHandle, SubscriptionCallbacks, TimerCallback};
pub use subscription::{SubscriptionHandle, SubscriptionInfo};
pub use timer::{Timer, TimerInfo};
pub use transport::{Subscription, Transport, TransportMessage};
