//! Simulated door opener.
//!
//! Watches relay pulses on a [`SimulatedBoard`](super::SimulatedBoard) and
//! moves the simulated door the way a single-button opener does: a press on
//! a closed door opens it, a press on an open door closes it, and a close
//! that finishes with the beam blocked reverses back to open.
//!
//! Presses that arrive while the door is travelling are ignored.

use super::BoardHandle;
use crate::types::InputPin;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Door opener model driven by relay pulses.
#[derive(Debug, Clone)]
pub struct SimulatedMotor {
    handle: BoardHandle,
    travel: Duration,
}

impl SimulatedMotor {
    pub fn new(handle: BoardHandle, travel: Duration) -> Self {
        Self { handle, travel }
    }

    /// Run the motor model until the returned task is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut seen = self.handle.relay_pulses();
        loop {
            self.handle.wait_for_pulse().await;
            if self.handle.relay_pulses() == seen {
                // Stale permit from a pulse that landed mid-travel.
                continue;
            }

            self.travel_once().await;
            seen = self.handle.relay_pulses();
        }
    }

    async fn travel_once(&self) {
        let closed = self.handle.input(InputPin::Closed).is_asserted();
        let open = self.handle.input(InputPin::Open).is_asserted();

        match (closed, open) {
            (true, false) => {
                debug!("Simulated door opening");
                self.handle.set_rollup(false, false);
                tokio::time::sleep(self.travel).await;
                self.handle.set_rollup(false, true);
            }
            (false, true) => {
                debug!("Simulated door closing");
                self.handle.set_rollup(false, false);
                tokio::time::sleep(self.travel).await;
                if self.handle.input(InputPin::Beam).is_asserted() {
                    debug!("Simulated door reversing: beam blocked");
                    tokio::time::sleep(self.travel).await;
                    self.handle.set_rollup(false, true);
                } else {
                    self.handle.set_rollup(true, false);
                }
            }
            _ => debug!("Simulated door ignoring press while not at rest"),
        }
    }
}
