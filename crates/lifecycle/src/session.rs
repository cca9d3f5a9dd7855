//! Lifecycle controller
//!
//! A `Session` acquires the bridge, then transports, then publishers,
//! subscriptions and timers, and records each acquisition on a stack.
//! `shutdown` pops that stack, so handles are always released in reverse
//! acquisition order and the bridge is closed last.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use pubsub_metadata::Properties;
use pubsub_middleware::{
    Bridge, MiddlewareError, Publisher, StopHandle, SubscriptionCallbacks, SubscriptionHandle,
    SubscriptionInfo, Timer, TimerCallback, TimerInfo, Transport,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Bridge,
    Transport,
    Publisher,
    Subscription,
    Timer,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Bridge => "bridge",
            ResourceKind::Transport => "transport",
            ResourceKind::Publisher => "publisher",
            ResourceKind::Subscription => "subscription",
            ResourceKind::Timer => "timer",
        };
        f.write_str(name)
    }
}

enum Resource {
    Transport(Arc<dyn Transport>),
    Publisher(Publisher),
    Subscription(SubscriptionHandle),
    Timer(Timer),
}

impl Resource {
    fn kind(&self) -> ResourceKind {
        match self {
            Resource::Transport(_) => ResourceKind::Transport,
            Resource::Publisher(_) => ResourceKind::Publisher,
            Resource::Subscription(_) => ResourceKind::Subscription,
            Resource::Timer(_) => ResourceKind::Timer,
        }
    }

    fn label(&self) -> String {
        match self {
            Resource::Transport(t) => t.name().to_string(),
            Resource::Publisher(p) => p.topic().to_string(),
            Resource::Subscription(s) => s.topic().to_string(),
            Resource::Timer(t) => format!("timer-{}", t.info().id),
        }
    }

    async fn release(self) -> Result<(), MiddlewareError> {
        match self {
            Resource::Timer(timer) => {
                timer.destroy();
                Ok(())
            }
            Resource::Subscription(handle) => handle.destroy().await,
            Resource::Publisher(publisher) => {
                publisher.destroy();
                Ok(())
            }
            Resource::Transport(transport) => transport.close().await.map_err(Into::into),
        }
    }
}

/// One handle released during shutdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Released {
    pub kind: ResourceKind,
    pub label: String,
}

/// Handles released by `Session::shutdown`, in release order
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub released: Vec<Released>,
    /// Release failures; the handle is still counted as released
    pub errors: Vec<(Released, MiddlewareError)>,
}

impl ShutdownReport {
    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.released.iter().map(|r| r.kind).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.released.is_empty()
    }
}

/// Explicit owner of every middleware handle a client holds
#[derive(Default)]
pub struct Session {
    bridge: Option<Arc<Bridge>>,
    acquired: Vec<Resource>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the named bridge and open it with `properties`
    pub fn initialize(
        &mut self,
        backend: &str,
        properties: Properties,
    ) -> Result<Arc<Bridge>, MiddlewareError> {
        self.ensure_uninitialized()?;
        let bridge = Bridge::load(backend)?;
        self.adopt(bridge, properties)
    }

    /// Open an already loaded bridge, e.g. a memory bridge over a shared hub
    pub fn initialize_with(
        &mut self,
        bridge: Arc<Bridge>,
        properties: Properties,
    ) -> Result<Arc<Bridge>, MiddlewareError> {
        self.ensure_uninitialized()?;
        self.adopt(bridge, properties)
    }

    fn adopt(&mut self, bridge: Arc<Bridge>, properties: Properties) -> Result<Arc<Bridge>, MiddlewareError> {
        bridge.open(properties)?;
        self.bridge = Some(Arc::clone(&bridge));
        Ok(bridge)
    }

    fn ensure_uninitialized(&self) -> Result<(), MiddlewareError> {
        if self.bridge.is_some() {
            return Err(MiddlewareError::InvalidState(
                "session already initialized".to_string(),
            ));
        }
        Ok(())
    }

    fn bridge_or_err(&self) -> Result<&Arc<Bridge>, MiddlewareError> {
        self.bridge
            .as_ref()
            .ok_or_else(|| MiddlewareError::InvalidState("session not initialized".to_string()))
    }

    pub fn bridge(&self) -> Option<&Arc<Bridge>> {
        self.bridge.as_ref()
    }

    /// Create the named transport on the session's bridge
    pub async fn connect(&mut self, transport_name: &str) -> Result<Arc<dyn Transport>, MiddlewareError> {
        let bridge = Arc::clone(self.bridge_or_err()?);
        let transport = bridge.create_transport(transport_name).await?;
        self.acquired.push(Resource::Transport(Arc::clone(&transport)));
        Ok(transport)
    }

    pub fn create_publisher(
        &mut self,
        transport: &Arc<dyn Transport>,
        topic: &str,
    ) -> Result<Publisher, MiddlewareError> {
        self.bridge_or_err()?;
        let publisher = Publisher::create(Arc::clone(transport), topic)?;
        self.acquired.push(Resource::Publisher(publisher.clone()));
        Ok(publisher)
    }

    /// Periodic timer on the bridge's default queue
    pub fn create_timer(
        &mut self,
        interval: Duration,
        callback: Arc<dyn TimerCallback>,
    ) -> Result<TimerInfo, MiddlewareError> {
        let bridge = self.bridge_or_err()?;
        let timer = Timer::create(bridge.default_queue(), interval, callback)?;
        let info = timer.info().clone();
        self.acquired.push(Resource::Timer(timer));
        Ok(info)
    }

    pub async fn subscribe(
        &mut self,
        transport: &Arc<dyn Transport>,
        topic: &str,
        callbacks: Arc<dyn SubscriptionCallbacks>,
    ) -> Result<SubscriptionInfo, MiddlewareError> {
        let bridge = Arc::clone(self.bridge_or_err()?);
        let handle = SubscriptionHandle::create(transport, bridge.default_queue(), topic, callbacks).await?;
        let info = handle.info().clone();
        self.acquired.push(Resource::Subscription(handle));
        Ok(info)
    }

    /// Kinds of the handles currently held, in acquisition order (bridge excluded)
    pub fn acquired(&self) -> Vec<ResourceKind> {
        self.acquired.iter().map(Resource::kind).collect()
    }

    pub fn stop_handle(&self) -> Result<StopHandle, MiddlewareError> {
        Ok(self.bridge_or_err()?.stop_handle())
    }

    /// Hand control to the dispatcher until a stop is requested
    pub async fn run(&self) -> Result<(), MiddlewareError> {
        let bridge = self.bridge_or_err()?;
        bridge.start().await
    }

    /// Stop the dispatcher and release every held handle, newest first,
    /// then close the bridge. Only what was acquired is released; calling
    /// this again releases nothing.
    pub async fn shutdown(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        if let Some(ref bridge) = self.bridge {
            bridge.stop();
        }

        while let Some(resource) = self.acquired.pop() {
            let released = Released {
                kind: resource.kind(),
                label: resource.label(),
            };
            debug!(kind = %released.kind, label = %released.label, "Releasing");
            if let Err(e) = resource.release().await {
                warn!(kind = %released.kind, label = %released.label, error = %e, "Release failed");
                report.errors.push((released.clone(), e));
            }
            report.released.push(released);
        }

        if let Some(bridge) = self.bridge.take() {
            let released = Released {
                kind: ResourceKind::Bridge,
                label: bridge.name().to_string(),
            };
            if let Err(e) = bridge.close() {
                warn!(bridge = %bridge.name(), error = %e, "Bridge close failed");
                report.errors.push((released.clone(), e));
            }
            report.released.push(released);
        }

        if !report.is_empty() {
            info!(released = report.released.len(), "Session shut down");
        }
        report
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.acquired.is_empty() || self.bridge.is_some() {
            warn!(
                held = self.acquired.len(),
                "Session dropped without shutdown; handles released by drop"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_before_initialize_is_invalid_state() {
        let mut session = Session::new();
        let result = session.connect("vmr").await;
        assert!(matches!(result, Err(MiddlewareError::InvalidState(_))));
        assert!(session.shutdown().await.is_empty());
    }

    #[test]
    fn test_initialize_twice_rejected() {
        let mut session = Session::new();
        session.initialize("memory", Properties::default()).unwrap();
        let again = session.initialize("memory", Properties::default());
        assert!(matches!(again, Err(MiddlewareError::InvalidState(_))));
    }

    #[test]
    fn test_unknown_backend_leaves_session_empty() {
        let mut session = Session::new();
        assert!(session.initialize("solace", Properties::default()).is_err());
        assert!(session.bridge().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_after_bridge_only() {
        let mut session = Session::new();
        session.initialize("memory", Properties::default()).unwrap();

        let report = session.shutdown().await;
        assert_eq!(report.kinds(), vec![ResourceKind::Bridge]);
        assert!(report.errors.is_empty());
    }
}
