mod linux;
pub mod sim;

use crate::{ExpanderError, ExpanderResult};
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
pub use linux::*;

/// A validated 7-bit I2C slave address.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ChipAddress(u8);

impl ChipAddress {
    pub const MAX: u8 = 0x7F;

    /// Creates the address, rejecting anything that does not fit in 7 bits.
    pub fn new(address: u8) -> ExpanderResult<Self> {
        if address > Self::MAX {
            return Err(ExpanderError::Configuration(format!(
                "address 0x{:02x} is out of range (0x00-0x7f)",
                address
            )));
        }
        Ok(ChipAddress(address))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl FromStr for ChipAddress {
    type Err = ExpanderError;

    /// Parses `0x`-prefixed hex or plain decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u8::from_str_radix(hex, 16),
            None => s.parse(),
        };
        let value = parsed
            .map_err(|_| ExpanderError::Configuration(format!("invalid address value: {:?}", s)))?;
        ChipAddress::new(value)
    }
}

impl Display for ChipAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

/// A bus that can open addressed sessions to byte-oriented register devices.
pub trait I2cBus: Debug {
    type Device: I2cDevice;

    /// Opens a session bound to the device at `address`.
    ///
    /// # Errors
    /// - `ExpanderError::BusOpenFailed` if the bus is missing, inaccessible or refuses the address.
    fn open(&self, address: ChipAddress) -> ExpanderResult<Self::Device>;
}

/// An open session to a single device on the bus.
///
/// Dropping the session releases it.
pub trait I2cDevice: Debug {
    /// Writes all of `bytes` in a single transaction.
    fn write(&mut self, bytes: &[u8]) -> ExpanderResult<()>;

    /// Fills `buffer` in a single transaction.
    fn read(&mut self, buffer: &mut [u8]) -> ExpanderResult<()>;
}
