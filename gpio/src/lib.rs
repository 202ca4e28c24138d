pub mod i2c;
pub mod mcp23017;
pub mod keypad;
pub mod debounce;
pub mod cancel;
pub mod scanner;

use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum ExpanderError {
    /// The bus device could not be opened or the chip address could not be bound.
    #[error("failed to open bus: {0}")]
    BusOpenFailed(String),
    /// A read or write on an open bus failed or transferred fewer bytes than requested.
    #[error("bus transaction failed: {0}")]
    TransactionFailed(String),
    #[error("bus is not open")]
    NotOpen,
    /// Invalid address or argument, detected before touching the hardware.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl ExpanderError {
    pub(crate) fn transaction(what: &str, err: impl std::fmt::Display) -> Self {
        ExpanderError::TransactionFailed(format!("{}: {}", what, err))
    }
}

pub type ExpanderResult<T> = Result<T, ExpanderError>;
