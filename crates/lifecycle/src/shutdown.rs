//! Interrupt-driven shutdown
//!
//! `Running` → (interrupt, operator confirms) → `Stopping` → (teardown) → `Stopped`.
//! A declined or unreadable confirmation leaves the machine in `Running` with
//! the interrupt handler still armed. The interrupt side only ever requests a
//! dispatcher stop; teardown happens on the task that owns the session.

use std::fmt;
use std::sync::Arc;

use pubsub_middleware::{MiddlewareError, StopHandle};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::prompt::Confirm;
use crate::session::{Session, ShutdownReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for ShutdownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownState::Running => "running",
            ShutdownState::Stopping => "stopping",
            ShutdownState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

pub struct ShutdownController {
    state: watch::Sender<ShutdownState>,
    stop: StopHandle,
}

impl ShutdownController {
    pub fn new(stop: StopHandle) -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self { state, stop }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.state.subscribe()
    }

    /// Handle one interrupt: ask for confirmation and move to `Stopping`
    /// on a yes. Returns the resulting state.
    pub async fn on_interrupt<C: Confirm + ?Sized>(&self, confirm: &mut C) -> ShutdownState {
        let current = self.state();
        if current != ShutdownState::Running {
            debug!(state = %current, "Ignoring interrupt");
            return current;
        }

        match confirm.confirm().await {
            Ok(true) => {
                self.state.send_replace(ShutdownState::Stopping);
                self.stop.request_stop();
                info!("Stop confirmed");
            }
            Ok(false) => {
                info!("Stop declined, continuing");
            }
            Err(e) => {
                warn!(error = %e, "Could not read confirmation, continuing");
            }
        }
        self.state()
    }

    /// Teardown finished
    pub fn mark_stopped(&self) {
        self.state.send_replace(ShutdownState::Stopped);
    }
}

/// Dispatch until stopped, tear the session down, then report `Stopped`.
///
/// A dispatcher failure still tears the session down before it is returned.
pub async fn run_until_stopped(
    session: &mut Session,
    controller: &ShutdownController,
) -> Result<ShutdownReport, MiddlewareError> {
    let outcome = session.run().await;
    let report = session.shutdown().await;
    controller.mark_stopped();
    outcome.map(|_| report)
}

/// Dispatch with `interrupts` answered by `confirm`, then tear down.
///
/// The interrupt source may be armed before the session is set up;
/// interrupts raised meanwhile are buffered and answered once dispatch starts.
pub async fn run_with_interrupts<C: Confirm + 'static>(
    session: &mut Session,
    interrupts: mpsc::Receiver<()>,
    confirm: C,
) -> Result<ShutdownReport, MiddlewareError> {
    let controller = Arc::new(ShutdownController::new(session.stop_handle()?));
    let supervisor = tokio::spawn(supervise_interrupts(
        interrupts,
        Arc::clone(&controller),
        confirm,
    ));
    let outcome = run_until_stopped(session, &controller).await;
    supervisor.abort();
    outcome
}

/// Answer interrupts until one is confirmed or the interrupt source ends
pub async fn supervise_interrupts<C: Confirm>(
    mut interrupts: mpsc::Receiver<()>,
    controller: Arc<ShutdownController>,
    mut confirm: C,
) {
    while interrupts.recv().await.is_some() {
        if controller.on_interrupt(&mut confirm).await != ShutdownState::Running {
            break;
        }
    }
}

/// Forward Ctrl-C presses into a channel
pub fn ctrl_c_interrupts() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
                break;
            }
            info!("Received interrupt signal");
            if tx.send(()).await.is_err() {
                break;
            }
        }
    });
    rx
}
