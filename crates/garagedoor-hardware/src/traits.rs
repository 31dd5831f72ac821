//! Digital I/O capability consumed by the control layer.
//!
//! The trait is deliberately small: level reads, level writes, and a way to
//! be told about input changes. Reads and writes are synchronous because the
//! underlying bus transfers complete in microseconds; edge delivery is
//! asynchronous through a channel so the board never calls back into the
//! control layer while holding its own locks.
//!
//! Unlike the async device traits elsewhere in the workspace, `DigitalIo` is
//! object-safe and is shared as `Arc<dyn DigitalIo>`.

use crate::error::Result;
use crate::types::{EdgeEvent, InputPin, Level, OutputPin};
use tokio::sync::mpsc;

/// Level-read inputs, level-set outputs, and edge-change subscription.
///
/// # Examples
///
/// ```
/// use garagedoor_hardware::{DigitalIo, InputPin, Level};
/// use garagedoor_hardware::mock::SimulatedBoard;
///
/// # fn example() -> garagedoor_hardware::Result<()> {
/// let (board, handle) = SimulatedBoard::new();
/// handle.set_input(InputPin::Closed, Level::Low);
///
/// assert!(board.read_input(InputPin::Closed)?.is_asserted());
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub trait DigitalIo: Send + Sync {
    /// Read the current level of an input.
    ///
    /// # Errors
    ///
    /// Returns an error if the board cannot be reached.
    fn read_input(&self, pin: InputPin) -> Result<Level>;

    /// Drive an output to the given level.
    ///
    /// # Errors
    ///
    /// Returns an error if the board cannot be reached.
    fn set_output(&self, pin: OutputPin, level: Level) -> Result<()>;

    /// Deliver every future level change of `pin` into `sender`.
    ///
    /// Several pins may share one sender; events for a single pin arrive in
    /// the order they happened. Delivery stops when the receiver is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the board cannot watch the pin.
    fn subscribe_edge(&self, pin: InputPin, sender: mpsc::UnboundedSender<EdgeEvent>)
    -> Result<()>;
}
