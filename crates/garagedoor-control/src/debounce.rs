//! Time-window gate for noisy sensor groups.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Accepts one event, then rejects everything until `window` has passed.
///
/// The gate reopens on its own; callers never close it explicitly.
///
/// ```
/// use garagedoor_control::DebounceGate;
/// use std::time::Duration;
///
/// let gate = DebounceGate::new(Duration::from_millis(500));
/// assert!(gate.try_accept());
/// assert!(!gate.try_accept());
/// ```
#[derive(Debug)]
pub struct DebounceGate {
    window: Duration,
    reopens_at: Mutex<Option<Instant>>,
}

impl DebounceGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            reopens_at: Mutex::new(None),
        }
    }

    /// Returns `true` if the event should be handled.
    pub fn try_accept(&self) -> bool {
        self.try_accept_at(Instant::now())
    }

    pub fn try_accept_at(&self, now: Instant) -> bool {
        let mut reopens_at = self.reopens_at.lock();
        if let Some(at) = *reopens_at {
            if now < at {
                return false;
            }
        }
        *reopens_at = Some(now + self.window);
        true
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
