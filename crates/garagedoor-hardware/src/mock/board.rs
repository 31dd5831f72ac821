//! Simulated PiFace-style board.
//!
//! The board keeps input and output levels in memory. A [`BoardHandle`]
//! plays the part of the physical world: it flips inputs (firing edge
//! events to subscribers) and lets tests inspect what the control layer
//! did to the outputs.

use crate::{
    DigitalIo, HardwareError, Result,
    types::{EdgeEvent, InputPin, Level, OutputPin},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Notify, mpsc};

#[derive(Debug)]
struct BoardState {
    inputs: Mutex<HashMap<InputPin, Level>>,
    outputs: Mutex<HashMap<OutputPin, Level>>,
    writes: Mutex<Vec<(OutputPin, Level)>>,
    subscribers: Mutex<HashMap<InputPin, Vec<mpsc::UnboundedSender<EdgeEvent>>>>,
    relay_pulses: AtomicU64,
    pulse: Notify,
    read_fault: AtomicBool,
}

impl BoardState {
    fn new() -> Self {
        // Resting state: door closed, beam clear, back door closed, buttons up.
        let inputs = HashMap::from([
            (InputPin::Button1, Level::High),
            (InputPin::Button2, Level::High),
            (InputPin::Closed, Level::Low),
            (InputPin::Open, Level::High),
            (InputPin::BackDoor, Level::Low),
            (InputPin::Beam, Level::High),
        ]);
        let outputs = HashMap::from([
            (OutputPin::Relay, Level::Low),
            (OutputPin::LedSpare, Level::Low),
            (OutputPin::LedTransit, Level::Low),
            (OutputPin::LedBeam, Level::Low),
            (OutputPin::LedMotor, Level::Low),
            (OutputPin::LedStatus, Level::Low),
            (OutputPin::LedWait, Level::Low),
        ]);

        Self {
            inputs: Mutex::new(inputs),
            outputs: Mutex::new(outputs),
            writes: Mutex::new(Vec::new()),
            subscribers: Mutex::new(HashMap::new()),
            relay_pulses: AtomicU64::new(0),
            pulse: Notify::new(),
            read_fault: AtomicBool::new(false),
        }
    }

    fn fire(&self, event: EdgeEvent) {
        let mut subscribers = self.subscribers.lock();
        if let Some(senders) = subscribers.get_mut(&event.pin) {
            senders.retain(|sender| sender.send(event).is_ok());
        }
    }
}

/// In-memory board implementing [`DigitalIo`].
///
/// # Examples
///
/// ```
/// use garagedoor_hardware::{DigitalIo, OutputPin, Level};
/// use garagedoor_hardware::mock::SimulatedBoard;
///
/// let (board, handle) = SimulatedBoard::new();
/// board.set_output(OutputPin::Relay, Level::High).unwrap();
/// board.set_output(OutputPin::Relay, Level::Low).unwrap();
///
/// assert_eq!(handle.relay_pulses(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SimulatedBoard {
    state: Arc<BoardState>,
}

impl SimulatedBoard {
    /// Create a board in its resting state and the handle that drives it.
    pub fn new() -> (Self, BoardHandle) {
        let state = Arc::new(BoardState::new());
        let board = Self {
            state: Arc::clone(&state),
        };
        (board, BoardHandle { state })
    }
}

impl DigitalIo for SimulatedBoard {
    fn read_input(&self, pin: InputPin) -> Result<Level> {
        if self.state.read_fault.load(Ordering::SeqCst) {
            return Err(HardwareError::communication("simulated read fault"));
        }
        self.state
            .inputs
            .lock()
            .get(&pin)
            .copied()
            .ok_or_else(|| HardwareError::pin_unavailable(pin))
    }

    fn set_output(&self, pin: OutputPin, level: Level) -> Result<()> {
        let previous = self.state.outputs.lock().insert(pin, level);
        self.state.writes.lock().push((pin, level));

        // A pulse is counted on release, once the contact has been made.
        if pin == OutputPin::Relay && previous == Some(Level::High) && level == Level::Low {
            self.state.relay_pulses.fetch_add(1, Ordering::SeqCst);
            self.state.pulse.notify_one();
        }
        Ok(())
    }

    fn subscribe_edge(
        &self,
        pin: InputPin,
        sender: mpsc::UnboundedSender<EdgeEvent>,
    ) -> Result<()> {
        self.state
            .subscribers
            .lock()
            .entry(pin)
            .or_default()
            .push(sender);
        Ok(())
    }
}

/// Handle for driving a [`SimulatedBoard`] from tests or the motor model.
///
/// Cloning the handle shares the same board.
#[derive(Debug, Clone)]
pub struct BoardHandle {
    state: Arc<BoardState>,
}

impl BoardHandle {
    /// Change an input level, firing an edge only if the level changed.
    pub fn set_input(&self, pin: InputPin, level: Level) {
        let previous = self.state.inputs.lock().insert(pin, level);
        if previous != Some(level) {
            self.state.fire(EdgeEvent::new(pin, level));
        }
    }

    /// Set an input level and fire an edge unconditionally.
    ///
    /// Models contact bounce, where the board reports changes faster than
    /// the settled level moves.
    pub fn emit_edge(&self, pin: InputPin, level: Level) {
        self.state.inputs.lock().insert(pin, level);
        self.state.fire(EdgeEvent::new(pin, level));
    }

    /// Press and release a user button.
    pub fn click(&self, pin: InputPin) {
        self.set_input(pin, Level::Low);
        self.set_input(pin, Level::High);
    }

    /// Put the rollup sensors in the given state (`true` = asserted).
    pub fn set_rollup(&self, closed: bool, open: bool) {
        self.set_input(InputPin::Closed, Level::from_asserted(closed));
        self.set_input(InputPin::Open, Level::from_asserted(open));
    }

    /// Block or clear the beam.
    pub fn set_beam_blocked(&self, blocked: bool) {
        self.set_input(InputPin::Beam, Level::from_asserted(blocked));
    }

    /// Current level of an input.
    pub fn input(&self, pin: InputPin) -> Level {
        self.state
            .inputs
            .lock()
            .get(&pin)
            .copied()
            .unwrap_or(Level::High)
    }

    /// Current level of an output.
    pub fn output(&self, pin: OutputPin) -> Level {
        self.state
            .outputs
            .lock()
            .get(&pin)
            .copied()
            .unwrap_or(Level::Low)
    }

    /// Whether an output is currently driven on.
    pub fn is_on(&self, pin: OutputPin) -> bool {
        self.output(pin) == Level::High
    }

    /// Number of writes made to an output since the board was created.
    pub fn writes_to(&self, pin: OutputPin) -> usize {
        self.state
            .writes
            .lock()
            .iter()
            .filter(|(written, _)| *written == pin)
            .count()
    }

    /// Number of completed relay pulses.
    pub fn relay_pulses(&self) -> u64 {
        self.state.relay_pulses.load(Ordering::SeqCst)
    }

    /// Wait until the next relay pulse completes.
    ///
    /// A pulse that happened while nobody was waiting is remembered once.
    pub async fn wait_for_pulse(&self) {
        self.state.pulse.notified().await;
    }

    /// Make every subsequent input read fail until cleared.
    pub fn set_read_fault(&self, fault: bool) {
        self.state.read_fault.store(fault, Ordering::SeqCst);
    }
}
