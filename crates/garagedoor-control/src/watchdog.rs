//! Open-door watchdog slot.
//!
//! One watchdog may be active per open cycle. Arming a new one cancels the
//! previous. The slot lock is held across the "is it still mine, is the
//! door still open, alert" sequence, so a cancel either lands before the
//! check (no alert) or after the alert was already due.

use crate::effects::Effects;
use crate::sensors::SensorModel;
use garagedoor_core::RollupStatus;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug)]
struct Active {
    generation: u64,
    token: CancellationToken,
}

/// Result of a watchdog wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Cancelled or superseded, stop quietly.
    Cancelled,
    /// The door is closed again; the slot has been released.
    Closed,
    /// The door is still not closed; an alert was sent.
    Alerted(RollupStatus),
}

#[derive(Debug, Default)]
pub struct Watchdog {
    slot: Mutex<Option<Active>>,
    next_generation: Mutex<u64>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new watchdog, cancelling any active one.
    pub fn arm(&self) -> (u64, CancellationToken) {
        let generation = {
            let mut next = self.next_generation.lock();
            *next += 1;
            *next
        };
        let token = CancellationToken::new();

        let mut slot = self.slot.lock();
        if let Some(previous) = slot.replace(Active {
            generation,
            token: token.clone(),
        }) {
            previous.token.cancel();
        }
        (generation, token)
    }

    /// Cancel the active watchdog, if any.
    pub fn cancel(&self) -> bool {
        match self.slot.lock().take() {
            Some(active) => {
                active.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Run one wake of the watchdog with this generation.
    pub fn check(&self, generation: u64, sensors: &SensorModel, effects: &dyn Effects) -> Check {
        let mut slot = self.slot.lock();
        let owned = slot
            .as_ref()
            .is_some_and(|active| active.generation == generation && !active.token.is_cancelled());
        if !owned {
            return Check::Cancelled;
        }

        match sensors.rollup() {
            RollupStatus::Closed => {
                debug!("Watchdog done, door closed");
                *slot = None;
                Check::Closed
            }
            status => {
                warn!(rollup = %status, "Rollup door still open");
                effects.send_open_door_alert();
                Check::Alerted(status)
            }
        }
    }
}
