//! Register-level driver for the MCP23017 16-bit I/O expander.
//!
//! Only port A is handled, with the default `IOCON.BANK = 0` register layout.
use crate::i2c::{ChipAddress, I2cBus, I2cDevice};
use crate::{ExpanderError, ExpanderResult};
use log::{debug, trace};
use std::fmt::{Debug, Formatter};

/// I/O direction, a set bit makes the pin an input.
pub const IODIRA: u8 = 0x00;
/// Input polarity, a set bit inverts the value read from the pin.
pub const IPOLA: u8 = 0x02;
/// Pull-up resistor enable for input pins.
pub const GPPUA: u8 = 0x0C;
/// Live pin levels.
pub const GPIOA: u8 = 0x12;
/// Output latch.
pub const OLATA: u8 = 0x14;

/// Direction, pull-up and polarity masks for one port.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PortConfiguration {
    /// Set bits are inputs, cleared bits are outputs.
    pub direction: u8,
    /// Set bits enable the internal pull-up. Only meaningful on inputs.
    pub pull_up: u8,
    /// Set bits invert the read value. Only meaningful on inputs.
    pub polarity: u8,
}

impl PortConfiguration {
    pub fn new(direction: u8, pull_up: u8) -> Self {
        PortConfiguration {
            direction,
            pull_up,
            polarity: 0x00,
        }
    }

    pub fn with_polarity(mut self, polarity: u8) -> Self {
        self.polarity = polarity;
        self
    }

    /// Pull-up and polarity bits that fall on output pins. The chip ignores these.
    pub fn ignored_bits(&self) -> u8 {
        (self.pull_up | self.polarity) & !self.direction
    }
}

/// An MCP23017 at a fixed address on an [I2cBus].
///
/// The bus session is opened with [Mcp23017::open] and released by [Mcp23017::close] or when the
/// driver is dropped. Register operations on a closed driver fail with
/// `ExpanderError::NotOpen` without touching the bus.
pub struct Mcp23017<B: I2cBus> {
    bus: B,
    address: ChipAddress,
    device: Option<B::Device>,
}

impl<B: I2cBus> Debug for Mcp23017<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Mcp23017({:?}@{})", self.bus, self.address)
    }
}

impl<B: I2cBus> Mcp23017<B> {
    pub fn new(bus: B, address: ChipAddress) -> Self {
        Mcp23017 {
            bus,
            address,
            device: None,
        }
    }

    pub fn address(&self) -> ChipAddress {
        self.address
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Opens the bus session. Does nothing if it is already open.
    pub fn open(&mut self) -> ExpanderResult<()> {
        if self.device.is_some() {
            return Ok(());
        }
        let device = self.bus.open(self.address)?;
        debug!("{:?} opened.", self);
        self.device = Some(device);
        Ok(())
    }

    /// Releases the bus session. Safe to call on a closed driver.
    pub fn close(&mut self) {
        if self.device.take().is_some() {
            debug!("{:?} closed.", self);
        }
    }

    fn device(&mut self) -> ExpanderResult<&mut B::Device> {
        self.device.as_mut().ok_or(ExpanderError::NotOpen)
    }

    /// Writes the register address, then reads one byte back.
    pub fn read_register(&mut self, register: u8) -> ExpanderResult<u8> {
        let device = self.device()?;
        device.write(&[register])?;
        let mut buffer = [0u8; 1];
        device.read(&mut buffer)?;
        trace!("Read  0x{:02x}: {:08b}", register, buffer[0]);
        Ok(buffer[0])
    }

    pub fn write_register(&mut self, register: u8, value: u8) -> ExpanderResult<()> {
        let device = self.device()?;
        trace!("Write 0x{:02x}: {:08b}", register, value);
        device.write(&[register, value])
    }

    /// Configures port A, writing IODIR first, then GPPU, then IPOL.
    pub fn configure_port_a(&mut self, config: PortConfiguration) -> ExpanderResult<()> {
        let ignored = config.ignored_bits();
        if ignored != 0 {
            debug!(
                "Pull-up/polarity bits {:08b} are set on output pins and will have no effect.",
                ignored
            );
        }
        self.write_register(IODIRA, config.direction)?;
        self.write_register(GPPUA, config.pull_up)?;
        self.write_register(IPOLA, config.polarity)
    }

    /// Reads the live level of port A, after polarity inversion.
    pub fn read_gpio_a(&mut self) -> ExpanderResult<u8> {
        self.read_register(GPIOA)
    }

    /// Writes the whole port A output latch. Bits of input pins are ignored by the chip.
    pub fn write_output_latch(&mut self, value: u8) -> ExpanderResult<()> {
        self.write_register(OLATA, value)
    }
}

impl<B: I2cBus> Drop for Mcp23017<B> {
    fn drop(&mut self) {
        self.close();
    }
}
