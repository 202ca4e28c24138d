//! An in-process MCP23017 with a 4x4 key matrix wired to port A.
//!
//! Rows sit on PA0..PA3 and columns on PA4..PA7. A pressed key connects its row and column, so
//! the column reads low while that row is configured as an output and driven low. Every bus
//! transaction is recorded, which makes the simulated chip useful for checking register traffic
//! as well as for running the scanner without hardware.
use crate::i2c::{ChipAddress, I2cBus, I2cDevice};
use crate::mcp23017::{GPIOA, GPPUA, IODIRA, IPOLA, OLATA};
use crate::{ExpanderError, ExpanderResult};
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Port A and B registers in BANK=0 addressing, 0x00..=0x15.
const REGISTER_COUNT: usize = 0x16;

/// One transaction as seen by the simulated chip.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Transaction {
    Write(Vec<u8>),
    Read(usize),
}

#[derive(Debug)]
struct ChipState {
    registers: [u8; REGISTER_COUNT],
    pointer: u8,
    pressed: Vec<(usize, usize)>,
    transactions: Vec<Transaction>,
    opens: usize,
    closes: usize,
    fail_open: bool,
    fail_after: Option<usize>,
}

impl ChipState {
    fn new() -> Self {
        let mut registers = [0u8; REGISTER_COUNT];
        // Power-on reset: every pin is an input.
        registers[IODIRA as usize] = 0xFF;
        registers[IODIRA as usize + 1] = 0xFF;
        ChipState {
            registers,
            pointer: 0,
            pressed: Vec::new(),
            transactions: Vec::new(),
            opens: 0,
            closes: 0,
            fail_open: false,
            fail_after: None,
        }
    }

    fn check_failure(&self) -> ExpanderResult<()> {
        match self.fail_after {
            Some(limit) if self.transactions.len() >= limit => Err(
                ExpanderError::TransactionFailed("simulated transport failure".to_string()),
            ),
            _ => Ok(()),
        }
    }

    fn check_register(register: u8) -> ExpanderResult<usize> {
        let index = register as usize;
        if index >= REGISTER_COUNT {
            return Err(ExpanderError::TransactionFailed(format!(
                "register 0x{:02x} does not exist",
                register
            )));
        }
        Ok(index)
    }

    /// The live level of port A, after polarity inversion.
    fn port_a(&self) -> u8 {
        let iodir = self.registers[IODIRA as usize];
        let olat = self.registers[OLATA as usize];
        let gppu = self.registers[GPPUA as usize];
        let ipol = self.registers[IPOLA as usize];

        // Floating inputs read low.
        let mut level = (olat & !iodir) | (gppu & iodir);

        for &(row, col) in &self.pressed {
            let row_bit = 1u8 << row;
            let col_bit = 1u8 << (4 + col);
            let row_driven_low = iodir & row_bit == 0 && olat & row_bit == 0;
            if row_driven_low && iodir & col_bit != 0 {
                level &= !col_bit;
            }
        }

        level ^ (ipol & iodir)
    }

    fn write(&mut self, bytes: &[u8]) -> ExpanderResult<()> {
        self.check_failure()?;
        let Some((&register, values)) = bytes.split_first() else {
            return Err(ExpanderError::TransactionFailed("empty write".to_string()));
        };
        let start = Self::check_register(register)?;
        if start + values.len() > REGISTER_COUNT {
            return Err(ExpanderError::TransactionFailed(format!(
                "{} bytes from register 0x{:02x} run past the last register",
                values.len(),
                register
            )));
        }
        for (index, &value) in (start..).zip(values) {
            // Writing GPIO writes the output latch.
            let index = if index == GPIOA as usize { OLATA as usize } else { index };
            self.registers[index] = value;
        }
        self.pointer = (start + values.len()) as u8;
        self.transactions.push(Transaction::Write(bytes.to_vec()));
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> ExpanderResult<()> {
        self.check_failure()?;
        for byte in buffer.iter_mut() {
            let index = Self::check_register(self.pointer)?;
            *byte = if index == GPIOA as usize {
                self.port_a()
            } else {
                self.registers[index]
            };
            self.pointer = self.pointer.wrapping_add(1);
        }
        self.transactions.push(Transaction::Read(buffer.len()));
        Ok(())
    }
}

/// The bus side of the simulated chip.
///
/// Clones share the same chip, so a test can keep one to press keys and inspect traffic while
/// the driver owns another.
#[derive(Clone)]
pub struct SimulatedBus {
    state: Arc<Mutex<ChipState>>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        SimulatedBus {
            state: Arc::new(Mutex::new(ChipState::new())),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChipState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Holds the key at (`row`, `col`) down until released.
    pub fn press(&self, row: usize, col: usize) {
        let mut state = self.state();
        if row < 4 && col < 4 && !state.pressed.contains(&(row, col)) {
            state.pressed.push((row, col));
        }
    }

    pub fn release(&self, row: usize, col: usize) {
        self.state().pressed.retain(|&key| key != (row, col));
    }

    pub fn release_all(&self) {
        self.state().pressed.clear();
    }

    /// Peeks at a register without going through the bus.
    ///
    /// # Panics
    /// If `register` is not an MCP23017 register (above 0x15).
    pub fn register(&self, register: u8) -> u8 {
        assert!(
            (register as usize) < REGISTER_COUNT,
            "register 0x{:02x} does not exist",
            register
        );
        self.state().registers[register as usize]
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.state().transactions.clone()
    }

    /// The `[register, value]` writes seen so far, in order.
    pub fn register_writes(&self) -> Vec<(u8, u8)> {
        self.state()
            .transactions
            .iter()
            .filter_map(|transaction| match transaction {
                Transaction::Write(bytes) if bytes.len() == 2 => Some((bytes[0], bytes[1])),
                _ => None,
            })
            .collect()
    }

    pub fn clear_transactions(&self) {
        self.state().transactions.clear();
    }

    pub fn opens(&self) -> usize {
        self.state().opens
    }

    pub fn closes(&self) -> usize {
        self.state().closes
    }

    /// Makes every subsequent `open` fail.
    pub fn fail_open(&self, fail: bool) {
        self.state().fail_open = fail;
    }

    /// Lets `count` more transactions succeed, then fails all the following ones.
    pub fn fail_after(&self, count: usize) {
        let mut state = self.state();
        state.fail_after = Some(state.transactions.len() + count);
    }
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for SimulatedBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimulatedBus")
    }
}

impl I2cBus for SimulatedBus {
    type Device = SimulatedDevice;

    fn open(&self, address: ChipAddress) -> ExpanderResult<SimulatedDevice> {
        let mut state = self.state();
        if state.fail_open {
            return Err(ExpanderError::BusOpenFailed(
                "simulated bus refused to open".to_string(),
            ));
        }
        state.opens += 1;
        Ok(SimulatedDevice {
            state: Arc::clone(&self.state),
            address,
        })
    }
}

pub struct SimulatedDevice {
    state: Arc<Mutex<ChipState>>,
    address: ChipAddress,
}

impl SimulatedDevice {
    fn state(&self) -> MutexGuard<'_, ChipState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for SimulatedDevice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimulatedDevice({})", self.address)
    }
}

impl I2cDevice for SimulatedDevice {
    fn write(&mut self, bytes: &[u8]) -> ExpanderResult<()> {
        self.state().write(bytes)
    }

    fn read(&mut self, buffer: &mut [u8]) -> ExpanderResult<()> {
        self.state().read(buffer)
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.state().closes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(bus: &SimulatedBus) -> SimulatedDevice {
        bus.open(ChipAddress::new(0x20).unwrap()).unwrap()
    }

    fn read_register(device: &mut SimulatedDevice, register: u8) -> u8 {
        let mut buffer = [0u8];
        device.write(&[register]).unwrap();
        device.read(&mut buffer).unwrap();
        buffer[0]
    }

    #[test]
    fn resets_with_all_pins_as_inputs() {
        let bus = SimulatedBus::new();
        assert_eq!(bus.register(IODIRA), 0xFF);
        assert_eq!(bus.register(OLATA), 0x00);
    }

    #[test]
    fn pressed_key_pulls_column_low_only_when_row_is_driven_low() {
        let bus = SimulatedBus::new();
        let mut device = device(&bus);
        device.write(&[IODIRA, 0xF0]).unwrap();
        device.write(&[GPPUA, 0xF0]).unwrap();
        bus.press(2, 1);

        device.write(&[OLATA, 0x0F]).unwrap();
        assert_eq!(read_register(&mut device, GPIOA), 0xFF);

        device.write(&[OLATA, 0x0B]).unwrap();
        assert_eq!(read_register(&mut device, GPIOA), 0xDB);

        device.write(&[OLATA, 0x0E]).unwrap();
        assert_eq!(read_register(&mut device, GPIOA), 0xFE);
    }

    #[test]
    fn polarity_inverts_inputs_only() {
        let bus = SimulatedBus::new();
        let mut device = device(&bus);
        device.write(&[IODIRA, 0xF0]).unwrap();
        device.write(&[GPPUA, 0xF0]).unwrap();
        device.write(&[IPOLA, 0xFF]).unwrap();
        device.write(&[OLATA, 0x0F]).unwrap();
        assert_eq!(read_register(&mut device, GPIOA), 0x0F);
    }

    #[test]
    fn records_transactions_and_sessions() {
        let bus = SimulatedBus::new();
        {
            let mut device = device(&bus);
            device.write(&[OLATA, 0x0F]).unwrap();
            read_register(&mut device, OLATA);
        }
        assert_eq!(bus.opens(), 1);
        assert_eq!(bus.closes(), 1);
        assert_eq!(
            bus.transactions(),
            vec![
                Transaction::Write(vec![OLATA, 0x0F]),
                Transaction::Write(vec![OLATA]),
                Transaction::Read(1),
            ]
        );
        assert_eq!(bus.register_writes(), vec![(OLATA, 0x0F)]);
    }

    #[test]
    fn injected_failure_stops_all_later_transactions() {
        let bus = SimulatedBus::new();
        let mut device = device(&bus);
        bus.fail_after(1);
        device.write(&[OLATA, 0x01]).unwrap();
        assert!(matches!(
            device.write(&[OLATA, 0x02]),
            Err(ExpanderError::TransactionFailed(_))
        ));
        assert!(device.read(&mut [0u8]).is_err());
        assert_eq!(bus.register(OLATA), 0x01);
    }

    #[test]
    fn rejects_unknown_registers() {
        let bus = SimulatedBus::new();
        let mut device = device(&bus);
        assert!(device.write(&[0x40, 0x00]).is_err());
    }

    #[test]
    fn write_past_last_register_changes_nothing() {
        let bus = SimulatedBus::new();
        let mut device = device(&bus);
        device.write(&[0x14, 0x0F, 0xAA]).unwrap();
        assert_eq!(bus.register(0x15), 0xAA);

        assert!(matches!(
            device.write(&[0x14, 0x01, 0x02, 0x03]),
            Err(ExpanderError::TransactionFailed(_))
        ));
        assert_eq!(bus.register(0x14), 0x0F);
        assert_eq!(bus.register(0x15), 0xAA);
        assert_eq!(bus.transactions().len(), 1);
        // The address pointer still points past the last good write.
        assert!(device.read(&mut [0u8]).is_err());
    }

    #[test]
    #[should_panic(expected = "register 0x16 does not exist")]
    fn peeking_at_unknown_register_panics() {
        SimulatedBus::new().register(0x16);
    }
}
