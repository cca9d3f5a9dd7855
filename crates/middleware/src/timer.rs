use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::error::MiddlewareError;
use crate::gate::ActivationGate;
use crate::queue::{next_handle_id, Event, EventQueue, TimerCallback};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerInfo {
    pub id: u64,
    pub interval: Duration,
}

/// Periodic timer whose callback runs on an event queue.
///
/// The first firing happens one interval after creation. Dropping or
/// destroying the timer stops further firings, including any tick that was
/// already queued but not yet dispatched.
pub struct Timer {
    info: Arc<TimerInfo>,
    gate: Arc<ActivationGate>,
    task: JoinHandle<()>,
}

impl Timer {
    pub fn create(
        queue: &EventQueue,
        interval: Duration,
        callback: Arc<dyn TimerCallback>,
    ) -> Result<Self, MiddlewareError> {
        if interval.is_zero() {
            return Err(MiddlewareError::Timer(
                "interval must be greater than zero".to_string(),
            ));
        }

        let start = Instant::now().checked_add(interval).ok_or_else(|| {
            MiddlewareError::Timer(format!("interval {:?} is out of range", interval))
        })?;

        let info = Arc::new(TimerInfo {
            id: next_handle_id(),
            interval,
        });
        let gate = Arc::new(ActivationGate::new());
        let tx = queue.sender();

        let task = {
            let info = Arc::clone(&info);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                let mut ticker = interval_at(start, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if !gate.is_active() {
                        break;
                    }
                    let event = Event::Timer {
                        info: Arc::clone(&info),
                        gate: Arc::clone(&gate),
                        callback: Arc::clone(&callback),
                    };
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            })
        };

        debug!(timer = info.id, interval_ms = interval.as_millis() as u64, "Timer created");
        Ok(Self { info, gate, task })
    }

    pub fn info(&self) -> &TimerInfo {
        &self.info
    }

    pub fn is_active(&self) -> bool {
        self.gate.is_active()
    }

    pub fn destroy(self) {
        debug!(timer = self.info.id, "Timer destroyed");
        drop(self);
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.gate.deactivate();
        self.task.abort();
    }
}
