//! Line protocol spoken between remote clients and the daemon.
//!
//! Frames are UTF-8 text lines. Clients send one command name per line
//! (case-insensitive), the server answers with fixed reply strings and, for
//! subscribers, repeated `STATUS` lines. Every server line ends in `\r\n`;
//! inbound lines may end in `\r\n` or `\n`.
//!
//! ```text
//! S: GARAGEDOOR
//! C: status
//! S: STATUS CLOSED CLOSED CLEAR DISARMED
//! C: toggle
//! S: TOGGLE DONE
//! ```

pub mod codec;
pub mod commands;
pub mod reply;

pub use codec::LineCodec;
pub use commands::Command;
pub use reply::Reply;
