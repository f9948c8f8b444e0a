use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared on/off switch for monitor alerting.
///
/// Clones share one flag, so the HTTP handler that flips it and the monitor
/// task that reads it always agree.
#[derive(Debug, Clone)]
pub struct AlertToggle {
    enabled: Arc<AtomicBool>,
}

impl AlertToggle {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Flip the flag and return the new value
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::AcqRel)
    }
}

impl Default for AlertToggle {
    fn default() -> Self {
        Self::new(true)
    }
}
