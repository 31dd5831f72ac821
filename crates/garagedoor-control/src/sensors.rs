//! Semantic door states read from the board.
//!
//! A failed read never surfaces as an error. Each reading falls back to the
//! state that keeps the automation from acting: the rollup door becomes
//! `UNKNOWN`, the beam `BLOCKED`, the back door `OPEN`.

use garagedoor_core::{BeamStatus, DoorStatus, RollupStatus};
use garagedoor_hardware::{DigitalIo, InputPin};
use std::sync::Arc;
use tracing::warn;

/// Reads sensors through a shared [`DigitalIo`].
#[derive(Clone)]
pub struct SensorModel {
    io: Arc<dyn DigitalIo>,
}

impl SensorModel {
    pub fn new(io: Arc<dyn DigitalIo>) -> Self {
        Self { io }
    }

    fn asserted(&self, pin: InputPin) -> Option<bool> {
        match self.io.read_input(pin) {
            Ok(level) => Some(level.is_asserted()),
            Err(e) => {
                warn!(%pin, error = %e, "Sensor read failed");
                None
            }
        }
    }

    /// Rollup door position from the closed and open sensors.
    pub fn rollup(&self) -> RollupStatus {
        match (self.asserted(InputPin::Closed), self.asserted(InputPin::Open)) {
            (Some(closed), Some(open)) => RollupStatus::from_sensors(closed, open),
            _ => RollupStatus::Unknown,
        }
    }

    pub fn beam(&self) -> BeamStatus {
        self.asserted(InputPin::Beam)
            .map_or(BeamStatus::Blocked, BeamStatus::from_sensor)
    }

    pub fn back_door(&self) -> DoorStatus {
        self.asserted(InputPin::BackDoor)
            .map_or(DoorStatus::Open, DoorStatus::from_sensor)
    }
}

impl std::fmt::Debug for SensorModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorModel").finish_non_exhaustive()
    }
}
