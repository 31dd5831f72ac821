//! Protocol strings, timing policy and configuration defaults.
//!
//! Timing values are grouped by the component that consumes them. All
//! durations are expressed in milliseconds so they can be fed directly to
//! `Duration::from_millis`.
//!
//! # Usage
//!
//! ```
//! use garagedoor_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(GREETING, "GARAGEDOOR");
//! let poll = Duration::from_millis(CLOSE_POLL_INTERVAL_MS);
//! assert_eq!(poll.as_millis(), 100);
//! ```

// ============================================================================
// Wire Protocol
// ============================================================================

/// Line sent by the server as soon as a session becomes active.
pub const GREETING: &str = "GARAGEDOOR";

/// Prefix of every status push.
pub const STATUS_PREFIX: &str = "STATUS";

/// Line terminator written after every server reply.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Maximum accepted length of a single inbound line, in bytes.
///
/// Longer lines are a protocol fault and close the session.
pub const MAX_LINE_LENGTH: usize = 8192;

// ============================================================================
// Button / Relay
// ============================================================================

/// How long the relay is held closed to emulate a button press.
pub const BUTTON_HOLD_MS: u64 = 250;

/// How long the motor LED stays lit when the disarm flag suppresses a press.
pub const DISARMED_HOLD_MS: u64 = 4000;

/// Light-show duration at startup.
pub const LIGHT_SHOW_MS: u64 = 1000;

// ============================================================================
// Close Automation
// ============================================================================

/// Poll interval of the close-automation loop.
pub const CLOSE_POLL_INTERVAL_MS: u64 = 100;

/// Pause after opening a closed door so the loop does not immediately see
/// CLOSED and exit.
pub const OPEN_SETTLE_MS: u64 = 2000;

/// Default close timeout: time the beam must stay clear before a press.
pub const DEFAULT_CLOSE_TIME_MS: u64 = 13_000;

/// Smallest close timeout accepted from configuration.
///
/// The door needs roughly this long to travel fully open; a shorter timeout
/// would fire while the door is still in transit.
pub const MIN_CLOSE_TIME_MS: u64 = 13_000;

// ============================================================================
// Event Translation
// ============================================================================

/// Debounce window applied per sensor group.
pub const DEBOUNCE_WINDOW_MS: u64 = 500;

// ============================================================================
// Watchdog
// ============================================================================

/// Interval between open-door checks.
pub const WATCHDOG_INTERVAL_MS: u64 = 60 * 60 * 1000;

// ============================================================================
// Status Subscriptions
// ============================================================================

/// Regular cadence of status pushes.
pub const STATUS_INTERVAL_MS: u64 = 20_000;

/// Follow-up delay after a wake, before returning to the regular cadence.
pub const STATUS_WAKE_INTERVAL_MS: u64 = 500;

// ============================================================================
// Server / Configuration Defaults
// ============================================================================

/// Default listen port.
pub const DEFAULT_PORT: u16 = 17000;

/// TLS handshake deadline for a freshly accepted connection.
pub const HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

/// How long a ban stays on record before a repeat failure bans again.
///
/// Matches the usual fail2ban `bantime`, so the address is re-banned once
/// the firewall has released it.
pub const DEFAULT_BAN_TIME_MS: u64 = 600_000;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/garagedoor/garagedoor.conf";

/// Presence of this file suppresses physical relay presses.
pub const DEFAULT_DISARM_FILE: &str = "/tmp/disarmed";

/// Command prefix used to play a cue; the sound file is appended.
pub const DEFAULT_SOUND_COMMAND: &str = "/usr/bin/play -q";

/// Command prefix used to ban an address; the IP is appended.
pub const DEFAULT_BAN_COMMAND: &str = "fail2ban-client set sshd banip";

/// Server private key.
pub const DEFAULT_KEY_FILE: &str = "/etc/garagedoor/key-server.pem";

/// Server certificate chain.
pub const DEFAULT_CERT_FILE: &str = "/etc/garagedoor/cert-server.pem";

/// Certificate(s) trusted for client authentication.
pub const DEFAULT_CLIENT_CERT_FILE: &str = "/etc/garagedoor/cert-client.pem";
