use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use pubsub_metadata::{Properties, TransportParams};
use tracing::{info, warn};

use crate::error::MiddlewareError;
use crate::memory::{InMemoryTransport, MemoryHub};
use crate::nats::NatsTransport;
use crate::queue::{EventQueue, StopHandle};
use crate::transport::Transport;

/// Backends a bridge can be loaded for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeKind {
    Memory,
    Nats,
}

impl BridgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BridgeKind::Memory => "memory",
            BridgeKind::Nats => "nats",
        }
    }
}

impl fmt::Display for BridgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BridgeKind {
    type Err = MiddlewareError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "memory" => Ok(BridgeKind::Memory),
            "nats" => Ok(BridgeKind::Nats),
            other => Err(MiddlewareError::Init(format!(
                "no bridge implementation named \"{}\"",
                other
            ))),
        }
    }
}

/// Loaded middleware backend with its default event queue.
///
/// Lifecycle: `load` → `open` → `create_transport`/`start` → `stop` → `close`.
pub struct Bridge {
    kind: BridgeKind,
    hub: Option<Arc<MemoryHub>>,
    properties: OnceCell<Properties>,
    queue: EventQueue,
    closed: AtomicBool,
}

impl Bridge {
    /// Resolve a backend by name. The memory bridge gets a private hub.
    pub fn load(name: &str) -> Result<Arc<Self>, MiddlewareError> {
        let kind: BridgeKind = name.parse()?;
        let hub = match kind {
            BridgeKind::Memory => Some(MemoryHub::new()),
            BridgeKind::Nats => None,
        };
        Ok(Self::build(kind, hub))
    }

    /// Memory bridge over an existing hub, so several sessions can talk
    pub fn load_memory(hub: Arc<MemoryHub>) -> Arc<Self> {
        Self::build(BridgeKind::Memory, Some(hub))
    }

    fn build(kind: BridgeKind, hub: Option<Arc<MemoryHub>>) -> Arc<Self> {
        info!(bridge = %kind, "Bridge loaded");
        Arc::new(Self {
            kind,
            hub,
            properties: OnceCell::new(),
            queue: EventQueue::new(format!("{}-default", kind)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn kind(&self) -> BridgeKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Hub backing a memory bridge
    pub fn hub(&self) -> Option<&Arc<MemoryHub>> {
        self.hub.as_ref()
    }

    /// Open the bridge with the process properties. May be called once.
    pub fn open(&self, properties: Properties) -> Result<(), MiddlewareError> {
        self.ensure_not_closed()?;
        self.properties
            .set(properties)
            .map_err(|_| MiddlewareError::InvalidState(format!("bridge {} already open", self.kind)))?;
        info!(bridge = %self.kind, "Bridge opened");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.properties.get().is_some() && !self.closed.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn opened_properties(&self) -> Result<&Properties, MiddlewareError> {
        self.ensure_not_closed()?;
        self.properties
            .get()
            .ok_or_else(|| MiddlewareError::InvalidState(format!("bridge {} not open", self.kind)))
    }

    fn ensure_not_closed(&self) -> Result<(), MiddlewareError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MiddlewareError::InvalidState(format!(
                "bridge {} closed",
                self.kind
            )));
        }
        Ok(())
    }

    /// Create a transport named in the properties file. A missing section
    /// means default parameters.
    pub async fn create_transport(&self, name: &str) -> Result<Arc<dyn Transport>, MiddlewareError> {
        let properties = self.opened_properties()?;
        let params = match properties.transport(self.name(), name) {
            Some(params) => params.clone(),
            None => {
                warn!(bridge = %self.kind, transport = %name, "No properties for transport, using defaults");
                TransportParams::default()
            }
        };

        let transport: Arc<dyn Transport> = match self.kind {
            BridgeKind::Memory => {
                let hub = self
                    .hub
                    .clone()
                    .ok_or_else(|| MiddlewareError::Allocation("memory bridge without hub".to_string()))?;
                Arc::new(InMemoryTransport::new(name, hub))
            }
            BridgeKind::Nats => Arc::new(NatsTransport::connect(name, &params).await?),
        };
        info!(bridge = %self.kind, transport = %name, "Transport created");
        Ok(transport)
    }

    pub fn default_queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.queue.stop_handle()
    }

    /// Dispatch the default queue until `stop` is requested
    pub async fn start(&self) -> Result<(), MiddlewareError> {
        self.opened_properties()?;
        self.queue.dispatch().await;
        Ok(())
    }

    pub fn stop(&self) {
        self.queue.stop_handle().request_stop();
    }

    /// Release the bridge. Everything created on it must be released first.
    pub fn close(&self) -> Result<(), MiddlewareError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(MiddlewareError::InvalidState(format!(
                "bridge {} already closed",
                self.kind
            )));
        }
        self.stop();
        info!(bridge = %self.kind, "Bridge closed");
        Ok(())
    }
}
