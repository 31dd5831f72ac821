//! Client command names.
//!
//! The command set is closed: a line that is not one of these names is a
//! protocol fault and ends the session. Matching is case-insensitive but
//! otherwise exact: `"arm "` is not `arm`.
//!
//! | Command     | Effect                                          | Reply            |
//! |-------------|-------------------------------------------------|------------------|
//! | `arm`       | toggle close automation                         | none             |
//! | `open`      | press the button if the door is closed          | `OPEN DONE`      |
//! | `close`     | press the button if the door is open            | `CLOSE DONE`     |
//! | `openclose` | start close automation                          | `OPENCLOSE DONE` |
//! | `toggle`    | press the button                                | `TOGGLE DONE`    |
//! | `ping`      | keep-alive                                      | none             |
//! | `status`    | start pushing `STATUS` lines                    | `STATUS ...`     |
//!
//! ```
//! use garagedoor_protocol::{Command, Reply};
//!
//! let cmd: Command = "OpenClose".parse().unwrap();
//! assert_eq!(cmd, Command::OpenClose);
//! assert_eq!(cmd.reply(), Some(Reply::OpenCloseDone));
//! assert!("foo".parse::<Command>().is_err());
//! ```

use crate::Reply;
use garagedoor_core::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A command sent by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Arm,
    Open,
    Close,
    OpenClose,
    Toggle,
    Ping,
    Status,
}

/// Name table used for parsing and display.
const COMMANDS: [(&str, Command); 7] = [
    ("arm", Command::Arm),
    ("open", Command::Open),
    ("close", Command::Close),
    ("openclose", Command::OpenClose),
    ("toggle", Command::Toggle),
    ("ping", Command::Ping),
    ("status", Command::Status),
];

impl Command {
    /// All commands, in table order.
    pub const ALL: [Command; 7] = [
        Command::Arm,
        Command::Open,
        Command::Close,
        Command::OpenClose,
        Command::Toggle,
        Command::Ping,
        Command::Status,
    ];

    /// Look a received line up in the command table.
    ///
    /// # Errors
    /// Returns `Error::UnknownCommand` for anything outside the table,
    /// including a known name with surrounding whitespace.
    pub fn parse(line: &str) -> Result<Self> {
        COMMANDS
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(line))
            .map(|(_, command)| *command)
            .ok_or_else(|| Error::UnknownCommand(line.to_string()))
    }

    /// Wire name, lowercase.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Command::Arm => "arm",
            Command::Open => "open",
            Command::Close => "close",
            Command::OpenClose => "openclose",
            Command::Toggle => "toggle",
            Command::Ping => "ping",
            Command::Status => "status",
        }
    }

    /// Fixed acknowledgement sent once the command's effect has run.
    ///
    /// `status` answers with subscription pushes instead, so it has none.
    #[must_use]
    pub fn reply(self) -> Option<Reply> {
        match self {
            Command::Open => Some(Reply::OpenDone),
            Command::Close => Some(Reply::CloseDone),
            Command::OpenClose => Some(Reply::OpenCloseDone),
            Command::Toggle => Some(Reply::ToggleDone),
            Command::Arm | Command::Ping | Command::Status => None,
        }
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Command::parse(s)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
