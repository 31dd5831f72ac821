//! Error types for hardware operations.
//!
//! Hardware faults are never fatal to the daemon: callers in the control
//! layer log them and fall back to the most conservative interpretation.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while reading or driving pins.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Board is not connected or has been shut down.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Pin is not wired up on this board.
    #[error("Pin not available: {pin}")]
    PinUnavailable { pin: String },

    /// Bus communication error (SPI, GPIO character device, ...).
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new unavailable pin error.
    pub fn pin_unavailable(pin: impl std::fmt::Display) -> Self {
        Self::PinUnavailable {
            pin: pin.to_string(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }
}
