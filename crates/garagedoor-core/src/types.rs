use crate::{Result, constants::STATUS_PREFIX, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of the rollup door, derived from the closed and open sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RollupStatus {
    Closed,
    Open,
    /// Neither sensor asserted: the door is travelling.
    Transit,
    /// Both sensors asserted, which cannot happen physically.
    Unknown,
}

impl RollupStatus {
    /// Derive the door position from the two magnetic sensors.
    ///
    /// Each argument is `true` when the sensor is asserted.
    ///
    /// ```
    /// use garagedoor_core::RollupStatus;
    ///
    /// assert_eq!(RollupStatus::from_sensors(true, false), RollupStatus::Closed);
    /// assert_eq!(RollupStatus::from_sensors(true, true), RollupStatus::Unknown);
    /// ```
    #[must_use]
    pub fn from_sensors(closed: bool, open: bool) -> Self {
        match (closed, open) {
            (false, false) => RollupStatus::Transit,
            (true, false) => RollupStatus::Closed,
            (false, true) => RollupStatus::Open,
            (true, true) => RollupStatus::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RollupStatus::Closed => "CLOSED",
            RollupStatus::Open => "OPEN",
            RollupStatus::Transit => "TRANSIT",
            RollupStatus::Unknown => "UNKNOWN",
        }
    }
}

/// State of the photoelectric beam across the door path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BeamStatus {
    Clear,
    Blocked,
}

impl BeamStatus {
    /// The beam sensor is asserted while something interrupts the beam.
    #[must_use]
    pub fn from_sensor(asserted: bool) -> Self {
        if asserted {
            BeamStatus::Blocked
        } else {
            BeamStatus::Clear
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BeamStatus::Clear => "CLEAR",
            BeamStatus::Blocked => "BLOCKED",
        }
    }
}

/// State of the back (walk-through) door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoorStatus {
    Closed,
    Open,
}

impl DoorStatus {
    #[must_use]
    pub fn from_sensor(asserted: bool) -> Self {
        if asserted {
            DoorStatus::Closed
        } else {
            DoorStatus::Open
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DoorStatus::Closed => "CLOSED",
            DoorStatus::Open => "OPEN",
        }
    }
}

/// Whether close automation is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArmedStatus {
    Armed,
    Disarmed,
}

impl ArmedStatus {
    #[must_use]
    pub fn from_running(running: bool) -> Self {
        if running {
            ArmedStatus::Armed
        } else {
            ArmedStatus::Disarmed
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ArmedStatus::Armed => "ARMED",
            ArmedStatus::Disarmed => "DISARMED",
        }
    }
}

macro_rules! impl_status_text {
    ($ty:ty, $($variant:path),+) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                $(
                    if s.eq_ignore_ascii_case($variant.as_str()) {
                        return Ok($variant);
                    }
                )+
                Err(Error::InvalidStatus(s.to_string()))
            }
        }
    };
}

impl_status_text!(
    RollupStatus,
    RollupStatus::Closed,
    RollupStatus::Open,
    RollupStatus::Transit,
    RollupStatus::Unknown
);
impl_status_text!(BeamStatus, BeamStatus::Clear, BeamStatus::Blocked);
impl_status_text!(DoorStatus, DoorStatus::Closed, DoorStatus::Open);
impl_status_text!(ArmedStatus, ArmedStatus::Armed, ArmedStatus::Disarmed);

/// Composite snapshot pushed to status subscribers.
///
/// Formats as the payload of a status line, without the `STATUS` prefix:
///
/// ```
/// use garagedoor_core::*;
///
/// let report = StatusReport {
///     rollup: RollupStatus::Open,
///     door: DoorStatus::Closed,
///     beam: BeamStatus::Clear,
///     armed: ArmedStatus::Armed,
/// };
/// assert_eq!(report.to_string(), "OPEN CLOSED CLEAR ARMED");
/// assert_eq!(report.to_line(), "STATUS OPEN CLOSED CLEAR ARMED");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub rollup: RollupStatus,
    pub door: DoorStatus,
    pub beam: BeamStatus,
    pub armed: ArmedStatus,
}

impl StatusReport {
    /// Full protocol line, without terminator.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{STATUS_PREFIX} {self}")
    }

    /// Parse a `STATUS <rollup> <door> <beam> <armed>` line.
    ///
    /// # Errors
    /// Returns `Error::InvalidStatus` if the prefix is missing, a field is
    /// not a known state, or the field count is wrong.
    pub fn parse_line(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        if parts.next() != Some(STATUS_PREFIX) {
            return Err(Error::InvalidStatus(line.to_string()));
        }

        let mut field = || {
            parts
                .next()
                .ok_or_else(|| Error::InvalidStatus(line.to_string()))
        };
        let report = StatusReport {
            rollup: field()?.parse()?,
            door: field()?.parse()?,
            beam: field()?.parse()?,
            armed: field()?.parse()?,
        };

        if parts.next().is_some() {
            return Err(Error::InvalidStatus(line.to_string()));
        }
        Ok(report)
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.rollup, self.door, self.beam, self.armed)
    }
}
