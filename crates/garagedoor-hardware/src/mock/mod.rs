//! Simulated hardware for testing, development and emulator mode.
//!
//! This module provides an in-memory board and a door-opener model that can
//! be controlled programmatically without requiring physical hardware.

pub mod board;
pub mod motor;

// Re-export commonly used types
pub use board::{BoardHandle, SimulatedBoard};
pub use motor::SimulatedMotor;
