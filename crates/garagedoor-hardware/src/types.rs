//! Pin, level and edge types.
//!
//! Pin numbering follows the PiFace Digital board the daemon was wired for.
//! Relay 0 shares its indicator with output 0, so the light show only
//! touches outputs 2 through 7.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Electrical level of a digital pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Sensors and buttons are wired active-low.
    #[must_use]
    pub fn is_asserted(self) -> bool {
        self == Level::Low
    }

    #[must_use]
    pub fn from_asserted(asserted: bool) -> Self {
        if asserted { Level::Low } else { Level::High }
    }

    /// Outputs are driven active-high: `on` lights an LED or closes a relay.
    #[must_use]
    pub fn from_on(on: bool) -> Self {
        if on { Level::High } else { Level::Low }
    }
}

/// Digital inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputPin {
    /// Abort/arm button.
    Button1,
    /// Direct press button.
    Button2,
    /// Magnetic sensor asserted when the rollup door is fully closed.
    Closed,
    /// Magnetic sensor asserted when the rollup door is fully open.
    Open,
    /// Back door contact, asserted when closed.
    BackDoor,
    /// Photoelectric eye, asserted when blocked.
    Beam,
}

impl InputPin {
    pub const ALL: [InputPin; 6] = [
        InputPin::Button1,
        InputPin::Button2,
        InputPin::Closed,
        InputPin::Open,
        InputPin::BackDoor,
        InputPin::Beam,
    ];

    /// Board input number.
    #[must_use]
    pub fn index(self) -> u8 {
        match self {
            InputPin::Button1 => 0,
            InputPin::Button2 => 1,
            InputPin::Closed => 4,
            InputPin::Open => 5,
            InputPin::BackDoor => 6,
            InputPin::Beam => 7,
        }
    }
}

impl fmt::Display for InputPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "input {} ({:?})", self.index(), self)
    }
}

/// Digital outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputPin {
    /// Relay wired across the motor's wall button.
    Relay,
    /// Unassigned indicator, lit only by the startup light show.
    LedSpare,
    LedTransit,
    LedBeam,
    LedMotor,
    LedStatus,
    LedWait,
}

impl OutputPin {
    /// Indicator LEDs, in board order.
    pub const LEDS: [OutputPin; 6] = [
        OutputPin::LedSpare,
        OutputPin::LedTransit,
        OutputPin::LedBeam,
        OutputPin::LedMotor,
        OutputPin::LedStatus,
        OutputPin::LedWait,
    ];

    /// Board output number.
    #[must_use]
    pub fn index(self) -> u8 {
        match self {
            OutputPin::Relay => 0,
            OutputPin::LedSpare => 2,
            OutputPin::LedTransit => 3,
            OutputPin::LedBeam => 4,
            OutputPin::LedMotor => 5,
            OutputPin::LedStatus => 6,
            OutputPin::LedWait => 7,
        }
    }
}

impl fmt::Display for OutputPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output {} ({:?})", self.index(), self)
    }
}

/// A level change observed on an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub pin: InputPin,
    /// Level after the change.
    pub level: Level,
}

impl EdgeEvent {
    #[must_use]
    pub fn new(pin: InputPin, level: Level) -> Self {
        Self { pin, level }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Level::Low, true)]
    #[case(Level::High, false)]
    fn test_active_low(#[case] level: Level, #[case] asserted: bool) {
        assert_eq!(level.is_asserted(), asserted);
        assert_eq!(Level::from_asserted(asserted), level);
    }

    #[test]
    fn test_outputs_active_high() {
        assert_eq!(Level::from_on(true), Level::High);
        assert_eq!(Level::from_on(false), Level::Low);
    }

    #[test]
    fn test_input_indices_unique() {
        let mut seen: Vec<u8> = InputPin::ALL.iter().map(|pin| pin.index()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), InputPin::ALL.len());
    }

    #[test]
    fn test_leds_cover_outputs_two_to_seven() {
        let indices: Vec<u8> = OutputPin::LEDS.iter().map(|led| led.index()).collect();
        assert_eq!(indices, (2..=7).collect::<Vec<u8>>());
    }

    #[test]
    fn test_pin_display() {
        assert_eq!(InputPin::Beam.to_string(), "input 7 (Beam)");
        assert_eq!(OutputPin::Relay.to_string(), "output 0 (Relay)");
    }
}
