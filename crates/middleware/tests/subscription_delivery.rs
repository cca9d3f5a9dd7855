//! Subscription delivery through the dispatcher over the memory bridge

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use pubsub_metadata::Properties;
use pubsub_middleware::{
    Bridge, Message, MiddlewareError, Publisher, Status, SubscriptionCallbacks, SubscriptionHandle,
    SubscriptionInfo,
};

#[derive(Debug)]
enum Seen {
    Created(String),
    Error(Status),
    Msg(String, Message),
}

struct Recorder {
    tx: mpsc::UnboundedSender<Seen>,
}

#[async_trait]
impl SubscriptionCallbacks for Recorder {
    async fn on_create(&self, sub: &SubscriptionInfo) {
        let _ = self.tx.send(Seen::Created(sub.topic.clone()));
    }

    async fn on_error(&self, _sub: &SubscriptionInfo, error: &MiddlewareError) {
        let _ = self.tx.send(Seen::Error(error.status()));
    }

    async fn on_msg(&self, _sub: &SubscriptionInfo, subject: &str, msg: &Message) {
        let _ = self.tx.send(Seen::Msg(subject.to_string(), msg.clone()));
    }
}

async fn next_seen(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for callback")
        .expect("recorder dropped")
}

fn open_bridge() -> Arc<Bridge> {
    let bridge = Bridge::load("memory").unwrap();
    bridge.open(Properties::default()).unwrap();
    bridge
}

fn spawn_dispatcher(bridge: &Arc<Bridge>) -> tokio::task::JoinHandle<()> {
    let bridge = Arc::clone(bridge);
    tokio::spawn(async move {
        bridge.start().await.unwrap();
    })
}

#[tokio::test]
async fn test_created_then_message_roundtrip() {
    let bridge = open_bridge();
    let dispatcher = spawn_dispatcher(&bridge);
    let transport = bridge.create_transport("local").await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = SubscriptionHandle::create(
        &transport,
        bridge.default_queue(),
        "tutorial.topic",
        Arc::new(Recorder { tx }),
    )
    .await
    .unwrap();

    assert!(matches!(next_seen(&mut rx).await, Seen::Created(topic) if topic == "tutorial.topic"));

    let publisher = Publisher::create(Arc::clone(&transport), "tutorial.topic").unwrap();
    let mut msg = Message::new();
    msg.add_string("A", 0, "v1").unwrap();
    msg.add_i32("B", 0, 2).unwrap();
    publisher.send(&msg).await.unwrap();

    match next_seen(&mut rx).await {
        Seen::Msg(subject, received) => {
            assert_eq!(subject, "tutorial.topic");
            assert_eq!(received, msg);
        }
        other => panic!("expected message, got {:?}", other),
    }

    handle.destroy().await.unwrap();
    bridge.stop();
    dispatcher.await.unwrap();
}

#[tokio::test]
async fn test_error_callback_keeps_subscription_alive() {
    let bridge = open_bridge();
    let dispatcher = spawn_dispatcher(&bridge);
    let transport = bridge.create_transport("local").await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = SubscriptionHandle::create(
        &transport,
        bridge.default_queue(),
        "tutorial.topic",
        Arc::new(Recorder { tx }),
    )
    .await
    .unwrap();
    assert!(matches!(next_seen(&mut rx).await, Seen::Created(_)));

    // Raw bytes that are not an encoded message
    transport
        .publish("tutorial.topic", Bytes::from_static(b"\x00garbage"))
        .await
        .unwrap();
    assert!(matches!(next_seen(&mut rx).await, Seen::Error(Status::CodecFailed)));
    assert!(handle.is_active());

    let publisher = Publisher::create(Arc::clone(&transport), "tutorial.topic").unwrap();
    let mut msg = Message::new();
    msg.add_string("after", 0, "error").unwrap();
    publisher.send(&msg).await.unwrap();
    assert!(matches!(next_seen(&mut rx).await, Seen::Msg(_, m) if m == msg));

    handle.destroy().await.unwrap();
    bridge.stop();
    dispatcher.await.unwrap();
}

#[tokio::test]
async fn test_wildcard_subscription_reports_concrete_subject() {
    let bridge = open_bridge();
    let dispatcher = spawn_dispatcher(&bridge);
    let transport = bridge.create_transport("local").await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = SubscriptionHandle::create(
        &transport,
        bridge.default_queue(),
        "tutorial.*",
        Arc::new(Recorder { tx }),
    )
    .await
    .unwrap();
    assert!(matches!(next_seen(&mut rx).await, Seen::Created(topic) if topic == "tutorial.*"));

    let publisher = Publisher::create(Arc::clone(&transport), "tutorial.prices").unwrap();
    publisher.send(&Message::new()).await.unwrap();
    assert!(matches!(next_seen(&mut rx).await, Seen::Msg(subject, _) if subject == "tutorial.prices"));

    handle.destroy().await.unwrap();
    bridge.stop();
    dispatcher.await.unwrap();
}

#[tokio::test]
async fn test_destroy_unsubscribes_and_stops_delivery() {
    let bridge = open_bridge();
    let dispatcher = spawn_dispatcher(&bridge);
    let transport = bridge.create_transport("local").await.unwrap();
    let hub = Arc::clone(bridge.hub().unwrap());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = SubscriptionHandle::create(
        &transport,
        bridge.default_queue(),
        "tutorial.topic",
        Arc::new(Recorder { tx }),
    )
    .await
    .unwrap();
    assert!(matches!(next_seen(&mut rx).await, Seen::Created(_)));
    assert_eq!(hub.stats().active_subscriptions, 1);

    handle.destroy().await.unwrap();
    assert_eq!(hub.stats().active_subscriptions, 0);

    let publisher = Publisher::create(Arc::clone(&transport), "tutorial.topic").unwrap();
    publisher.send(&Message::new()).await.unwrap();
    let quiet = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(quiet.is_err() || matches!(quiet, Ok(None)));

    bridge.stop();
    dispatcher.await.unwrap();
}

#[tokio::test]
async fn test_subscribe_on_closed_transport_fails() {
    let bridge = open_bridge();
    let transport = bridge.create_transport("local").await.unwrap();
    transport.close().await.unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    let result = SubscriptionHandle::create(
        &transport,
        bridge.default_queue(),
        "tutorial.topic",
        Arc::new(Recorder { tx }),
    )
    .await;
    assert!(matches!(result, Err(MiddlewareError::Subscription(_))));
}
