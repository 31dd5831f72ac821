use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Protocol errors
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Line too long: {length} bytes exceeds limit of {max_length}")]
    LineTooLong { length: usize, max_length: usize },

    #[error("Invalid UTF-8 in line")]
    InvalidUtf8,

    #[error("Invalid status value: {0}")]
    InvalidStatus(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
