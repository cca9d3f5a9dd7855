//! Session lifecycle over the memory bridge

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::sync::mpsc;

use pubsub_lifecycle::{
    run_until_stopped, run_with_interrupts, ConsolePrompt, ResourceKind, Session,
    ShutdownController, ShutdownState,
};
use pubsub_metadata::{BridgeConfig, Properties, TransportParams};
use pubsub_middleware::{
    Bridge, HubStats, MemoryHub, Message, MiddlewareError, Status, SubscriptionCallbacks,
    SubscriptionInfo,
};

struct Forward {
    tx: mpsc::UnboundedSender<Option<Message>>,
}

#[async_trait]
impl SubscriptionCallbacks for Forward {
    async fn on_create(&self, _sub: &SubscriptionInfo) {
        let _ = self.tx.send(None);
    }

    async fn on_error(&self, _sub: &SubscriptionInfo, _error: &MiddlewareError) {}

    async fn on_msg(&self, _sub: &SubscriptionInfo, _subject: &str, msg: &Message) {
        let _ = self.tx.send(Some(msg.clone()));
    }
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<Option<Message>>) -> Option<Message> {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for callback")
        .expect("callbacks dropped")
}

fn prompt(answer: &'static [u8]) -> ConsolePrompt<BufReader<&'static [u8]>, tokio::io::Sink> {
    ConsolePrompt::new(BufReader::new(answer), tokio::io::sink())
}

/// Session with transport → subscription → publisher on a memory bridge
async fn full_session(hub: &Arc<MemoryHub>) -> (Session, mpsc::UnboundedReceiver<Option<Message>>) {
    let mut session = Session::new();
    session
        .initialize_with(Bridge::load_memory(Arc::clone(hub)), Properties::default())
        .unwrap();
    let transport = session.connect("vmr").await.unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    session
        .subscribe(&transport, "tutorial.topic", Arc::new(Forward { tx }))
        .await
        .unwrap();
    session.create_publisher(&transport, "tutorial.topic").unwrap();
    (session, rx)
}

#[tokio::test]
async fn test_teardown_is_reverse_of_acquisition() {
    let hub = MemoryHub::new();
    let (mut session, _rx) = full_session(&hub).await;
    assert_eq!(
        session.acquired(),
        vec![
            ResourceKind::Transport,
            ResourceKind::Subscription,
            ResourceKind::Publisher
        ]
    );

    let report = session.shutdown().await;
    assert_eq!(
        report.kinds(),
        vec![
            ResourceKind::Publisher,
            ResourceKind::Subscription,
            ResourceKind::Transport,
            ResourceKind::Bridge
        ]
    );
    assert!(report.errors.is_empty());
    assert_eq!(hub.stats().open_transports, 0);
    assert_eq!(hub.stats().active_subscriptions, 0);

    // Released exactly once
    assert!(session.shutdown().await.is_empty());
}

#[tokio::test]
async fn test_failed_connect_releases_only_bridge() {
    let mut bridge_config = BridgeConfig::default();
    bridge_config.transports.insert(
        "vmr".to_string(),
        TransportParams {
            url: Some("nats://127.0.0.1:1".to_string()),
            ..Default::default()
        },
    );
    let mut properties = Properties::default();
    properties.bridges.insert("nats".to_string(), bridge_config);

    let mut session = Session::new();
    session.initialize("nats", properties).unwrap();
    let err = session.connect("vmr").await.err().unwrap();
    assert_eq!(err.status(), Status::ConnectionFailed);
    assert!(session.acquired().is_empty());

    let report = session.shutdown().await;
    assert_eq!(report.kinds(), vec![ResourceKind::Bridge]);
}

#[tokio::test]
async fn test_declined_interrupt_keeps_running_and_handles() {
    let hub = MemoryHub::new();
    let (mut session, _rx) = full_session(&hub).await;
    let controller = ShutdownController::new(session.stop_handle().unwrap());
    let before: HubStats = hub.stats();

    let state = controller.on_interrupt(&mut prompt(b"n\n")).await;

    assert_eq!(state, ShutdownState::Running);
    assert_eq!(session.acquired().len(), 3);
    assert_eq!(hub.stats().open_transports, before.open_transports);
    assert_eq!(hub.stats().active_subscriptions, before.active_subscriptions);
    assert!(!session.stop_handle().unwrap().is_stop_requested());

    session.shutdown().await;
}

#[tokio::test]
async fn test_confirmed_interrupt_stops_and_releases_once() {
    let hub = MemoryHub::new();
    let (mut session, _rx) = full_session(&hub).await;
    let controller = Arc::new(ShutdownController::new(session.stop_handle().unwrap()));

    let interrupter = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.on_interrupt(&mut prompt(b"y\n")).await })
    };

    let report = run_until_stopped(&mut session, &controller).await.unwrap();
    assert_eq!(interrupter.await.unwrap(), ShutdownState::Stopping);
    assert_eq!(controller.state(), ShutdownState::Stopped);

    let kinds = report.kinds();
    assert_eq!(kinds.len(), 4);
    for kind in [
        ResourceKind::Publisher,
        ResourceKind::Subscription,
        ResourceKind::Transport,
        ResourceKind::Bridge,
    ] {
        assert_eq!(kinds.iter().filter(|k| **k == kind).count(), 1);
    }
    assert_eq!(hub.stats(), HubStats { published: 0, ..Default::default() });
    assert!(session.shutdown().await.is_empty());
}

#[tokio::test]
async fn test_interrupt_raised_during_setup_is_answered() {
    let (interrupts_tx, interrupts) = mpsc::channel(1);
    interrupts_tx.send(()).await.unwrap();

    let hub = MemoryHub::new();
    let (mut session, _rx) = full_session(&hub).await;
    let report = tokio::time::timeout(
        Duration::from_secs(2),
        run_with_interrupts(&mut session, interrupts, prompt(b"y\n")),
    )
    .await
    .expect("buffered interrupt was not answered")
    .unwrap();

    assert_eq!(
        report.kinds(),
        vec![
            ResourceKind::Publisher,
            ResourceKind::Subscription,
            ResourceKind::Transport,
            ResourceKind::Bridge
        ]
    );
    assert_eq!(hub.stats().open_transports, 0);
}

#[tokio::test]
async fn test_run_with_interrupts_requires_initialized_session() {
    let (_tx, interrupts) = mpsc::channel(1);
    let mut session = Session::new();
    let err = run_with_interrupts(&mut session, interrupts, prompt(b"y\n"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Status::InvalidState);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_publish_once_per_interval() {
    let hub = MemoryHub::new();
    let mut session = Session::new();
    let bridge = session
        .initialize_with(Bridge::load_memory(Arc::clone(&hub)), Properties::default())
        .unwrap();
    let transport = session.connect("vmr").await.unwrap();
    let publisher = session
        .publish_periodically(
            &transport,
            "tutorial.topic",
            Duration::from_secs(3),
            Box::new(|| -> Result<Message, MiddlewareError> {
                let mut msg = Message::new();
                msg.add_string("MdMyTimestamp", 99, "tick")?;
                Ok(msg)
            }),
        )
        .unwrap();
    assert_eq!(
        session.acquired(),
        vec![ResourceKind::Transport, ResourceKind::Publisher, ResourceKind::Timer]
    );

    let dispatcher = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move { bridge.start().await })
    };

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(publisher.sent(), 3);
    assert_eq!(hub.stats().published, 3);

    let report = session.shutdown().await;
    assert_eq!(report.kinds()[0], ResourceKind::Timer);
    dispatcher.await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(publisher.sent(), 3);
}

#[tokio::test]
async fn test_hello_world_end_to_end() {
    let hub = MemoryHub::new();

    let mut subscriber = Session::new();
    let sub_bridge = subscriber
        .initialize_with(Bridge::load_memory(Arc::clone(&hub)), Properties::default())
        .unwrap();
    let sub_transport = subscriber.connect("vmr").await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    subscriber
        .subscribe(&sub_transport, "tutorial.topic", Arc::new(Forward { tx }))
        .await
        .unwrap();
    let dispatcher = {
        let bridge = Arc::clone(&sub_bridge);
        tokio::spawn(async move { bridge.start().await })
    };
    assert!(recv(&mut rx).await.is_none(), "expected on_create first");

    let mut publisher = Session::new();
    publisher
        .initialize_with(Bridge::load_memory(Arc::clone(&hub)), Properties::default())
        .unwrap();
    let pub_transport = publisher.connect("vmr").await.unwrap();
    let topic_publisher = publisher.create_publisher(&pub_transport, "tutorial.topic").unwrap();
    let mut greeting = Message::new();
    greeting.add_string("MyGreetingField", 99, "Hello World").unwrap();
    topic_publisher.send(&greeting).await.unwrap();
    publisher.shutdown().await;

    let received = recv(&mut rx).await.expect("message");
    assert_eq!(received.get_string("MyGreetingField", 99), Some("Hello World"));
    assert_eq!(received, greeting);

    subscriber.shutdown().await;
    dispatcher.await.unwrap().unwrap();
}
