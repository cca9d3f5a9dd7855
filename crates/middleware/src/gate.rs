use std::sync::atomic::{AtomicBool, Ordering};

/// Liveness flag shared between a handle and the work it schedules.
///
/// Destroying a handle closes its gate; the dispatcher drops queued events
/// whose gate is closed, so no callback runs for a destroyed handle.
#[derive(Debug)]
pub struct ActivationGate {
    active: AtomicBool,
}

impl ActivationGate {
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
        }
    }

    /// Close the gate. Returns true only for the call that closed it.
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Default for ActivationGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_starts_open() {
        assert!(ActivationGate::new().is_active());
    }

    #[test]
    fn test_deactivate_reports_first_close_only() {
        let gate = ActivationGate::new();
        assert!(gate.deactivate());
        assert!(!gate.deactivate());
        assert!(!gate.is_active());
    }
}
