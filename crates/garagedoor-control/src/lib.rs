//! Door control logic.
//!
//! [`DoorController`] owns every piece of shared state: the close
//! automation run flag, the watchdog slot and the status subscription
//! registry. Edge events from the board reach it through an
//! [`EventTranslator`], and network sessions call its command methods.
//!
//! ```text
//!  DigitalIo edges ──► EventTranslator ──► DoorController ◄── sessions
//!                        (debounce)          │   │    │
//!                                  close task┘   │    └ status subscriptions
//!                                          watchdog
//! ```
//!
//! Side effects that leave the process (sounds, alerts, bans) go through
//! the [`Effects`] trait so the logic can run against a recording double.

pub mod automation;
pub mod broadcast;
pub mod controller;
pub mod debounce;
pub mod effects;
pub mod events;
pub mod mock;
pub mod sensors;
pub mod watchdog;

pub use broadcast::{StatusRegistry, StatusSubscription};
pub use controller::{ControllerBuilder, DoorController, Timings};
pub use debounce::DebounceGate;
pub use effects::{Cue, DisarmFlag, Effects, ShellEffects};
pub use events::EventTranslator;
pub use sensors::SensorModel;
