//! Hardware abstraction layer for the garage door daemon.
//!
//! This crate describes the board the daemon runs on as a small capability
//! set: level-read digital inputs, level-set digital outputs, and an
//! edge-change subscription. The control layer only ever talks to the
//! [`DigitalIo`] trait, so the simulated board in [`mock`] and a physical
//! board driver are interchangeable.
//!
//! # Wiring
//!
//! | Pin | Direction | Meaning |
//! |-----|-----------|---------|
//! | input 0, 1 | in | user buttons (active-low) |
//! | input 4 | in | rollup fully closed (active-low) |
//! | input 5 | in | rollup fully open (active-low) |
//! | input 6 | in | back door closed (active-low) |
//! | input 7 | in | beam blocked (active-low) |
//! | output 0 | out | relay across the motor button |
//! | outputs 3-7 | out | transit, beam, motor, status, wait LEDs |
//!
//! # Example
//!
//! ```
//! use garagedoor_hardware::{DigitalIo, InputPin, OutputPin, Level};
//! use garagedoor_hardware::mock::SimulatedBoard;
//!
//! let (board, handle) = SimulatedBoard::new();
//!
//! board.set_output(OutputPin::LedWait, Level::High).unwrap();
//! assert!(handle.is_on(OutputPin::LedWait));
//!
//! handle.set_beam_blocked(true);
//! assert!(board.read_input(InputPin::Beam).unwrap().is_asserted());
//! ```

pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

pub use error::{HardwareError, Result};
pub use traits::DigitalIo;
pub use types::{EdgeEvent, InputPin, Level, OutputPin};
