use crate::i2c::I2cBus;
use crate::keypad::{KeyMap, Keypad, KeypadKey};
use crate::mcp23017::{Mcp23017, PortConfiguration};
use crate::ExpanderResult;
use log::{debug, trace};
use std::fmt::{Debug, Formatter};
use std::thread::sleep;
use std::time::Duration;

/// PA0..PA3, the row strobe outputs.
pub const ROW_MASK: u8 = 0b0000_1111;
/// PA4..PA7, the column sense inputs, pulled up.
pub const COL_MASK: u8 = 0b1111_0000;
/// Output latch value with every row inactive (high).
pub const ROWS_IDLE: u8 = ROW_MASK;

/// Finds the first column (PA4 first) read low in a port snapshot.
pub fn first_low_column(snapshot: u8) -> Option<usize> {
    let cols = snapshot & COL_MASK;
    if cols == COL_MASK {
        return None;
    }
    (0..KeyMap::COLS).find(|&col| cols & (1 << (4 + col)) == 0)
}

/// A 4x4 matrix keypad on port A of an MCP23017.
///
/// Rows are wired to PA0..PA3 and columns to PA4..PA7. Each row in turn is driven low while the
/// others stay high; a held key then pulls its column low.
pub struct Mcp23017Keypad<'a, B: I2cBus> {
    expander: &'a mut Mcp23017<B>,
    keymap: KeyMap,
    /// Time between strobing a row and sampling the columns.
    pub settle_time: Duration,
}

impl<B: I2cBus> Debug for Mcp23017Keypad<'_, B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Mcp23017Keypad({:?})", self.expander)
    }
}

impl<'a, B: I2cBus> Mcp23017Keypad<'a, B> {
    pub fn new(expander: &'a mut Mcp23017<B>, keymap: KeyMap) -> Self {
        Mcp23017Keypad {
            expander,
            keymap,
            settle_time: Duration::from_micros(300),
        }
    }

    pub fn with_settle_time(mut self, settle_time: Duration) -> Self {
        self.settle_time = settle_time;
        self
    }

    pub fn keymap(&self) -> &KeyMap {
        &self.keymap
    }

    /// Sets rows as outputs and columns as pulled-up inputs, then releases every row.
    pub fn init(&mut self) -> ExpanderResult<()> {
        self.expander
            .configure_port_a(PortConfiguration::new(COL_MASK, COL_MASK))?;
        self.expander.write_output_latch(ROWS_IDLE)?;
        debug!("{:?} initialized.", self);
        Ok(())
    }

    /// Drives `row` low and returns the first column found low.
    fn scan_row(&mut self, row: usize) -> ExpanderResult<Option<usize>> {
        let out = ROWS_IDLE & !(1u8 << row);
        self.expander.write_output_latch(out)?;
        sleep(self.settle_time);
        let snapshot = self.expander.read_gpio_a()?;
        Ok(first_low_column(snapshot))
    }
}

impl<B: I2cBus> Keypad for Mcp23017Keypad<'_, B> {
    type Key = KeypadKey;

    fn read(&mut self) -> ExpanderResult<Option<KeypadKey>> {
        let mut found = None;

        for row in 0..KeyMap::ROWS {
            if let Some(col) = self.scan_row(row)? {
                found = self.keymap.get(row, col);
                trace!("Row {} col {} is low: {:?}", row, col, found);
                break;
            }
        }

        self.expander.write_output_latch(ROWS_IDLE)?;
        Ok(found)
    }
}
