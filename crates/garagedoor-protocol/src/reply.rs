//! Lines sent from the server to clients.

use garagedoor_core::StatusReport;
use garagedoor_core::constants::GREETING;
use std::fmt;

/// A server-to-client line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Sent once when a session starts.
    Greeting,
    OpenDone,
    CloseDone,
    OpenCloseDone,
    ToggleDone,
    /// One push of a status subscription.
    Status(StatusReport),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Greeting => f.write_str(GREETING),
            Reply::OpenDone => f.write_str("OPEN DONE"),
            Reply::CloseDone => f.write_str("CLOSE DONE"),
            Reply::OpenCloseDone => f.write_str("OPENCLOSE DONE"),
            Reply::ToggleDone => f.write_str("TOGGLE DONE"),
            Reply::Status(report) => f.write_str(&report.to_line()),
        }
    }
}

impl From<StatusReport> for Reply {
    fn from(report: StatusReport) -> Self {
        Reply::Status(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garagedoor_core::{ArmedStatus, BeamStatus, DoorStatus, RollupStatus};

    #[test]
    fn test_fixed_replies() {
        assert_eq!(Reply::Greeting.to_string(), "GARAGEDOOR");
        assert_eq!(Reply::OpenDone.to_string(), "OPEN DONE");
        assert_eq!(Reply::CloseDone.to_string(), "CLOSE DONE");
        assert_eq!(Reply::OpenCloseDone.to_string(), "OPENCLOSE DONE");
        assert_eq!(Reply::ToggleDone.to_string(), "TOGGLE DONE");
    }

    #[test]
    fn test_status_reply() {
        let reply = Reply::from(StatusReport {
            rollup: RollupStatus::Transit,
            door: DoorStatus::Open,
            beam: BeamStatus::Blocked,
            armed: ArmedStatus::Armed,
        });
        assert_eq!(reply.to_string(), "STATUS TRANSIT OPEN BLOCKED ARMED");
    }
}
