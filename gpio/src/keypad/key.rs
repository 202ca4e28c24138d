use crate::{ExpanderError, ExpanderResult};
use std::fmt::{Display, Formatter};

/// Represents the keys on a 4x4 keypad.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum KeypadKey {
    /// The `1` key.
    Key1,
    /// The `2` key.
    Key2,
    /// The `3` key.
    Key3,
    /// The `4` key.
    Key4,
    /// The `5` key.
    Key5,
    /// The `6` key.
    Key6,
    /// The `7` key.
    Key7,
    /// The `8` key.
    Key8,
    /// The `9` key.
    Key9,
    /// The `0` key.
    Key0,
    /// The `*` key.
    KeyAsterisk,
    /// The `#` key.
    KeyHash,
    /// The `A` key.
    KeyA,
    /// The `B` key.
    KeyB,
    /// The `C` key.
    KeyC,
    /// The `D` key.
    KeyD,
}

impl KeypadKey {
    /// Converts the [KeypadKey] to its corresponding character.
    pub fn to_char(self) -> char {
        use KeypadKey::*;

        match self {
            Key1 => '1',
            Key2 => '2',
            Key3 => '3',
            Key4 => '4',
            Key5 => '5',
            Key6 => '6',
            Key7 => '7',
            Key8 => '8',
            Key9 => '9',
            Key0 => '0',
            KeyAsterisk => '*',
            KeyHash => '#',
            KeyA => 'A',
            KeyB => 'B',
            KeyC => 'C',
            KeyD => 'D',
        }
    }
}

impl TryFrom<char> for KeypadKey {
    type Error = ExpanderError;

    /// Letters are accepted in either case.
    fn try_from(c: char) -> Result<Self, Self::Error> {
        use KeypadKey::*;

        Ok(match c.to_ascii_uppercase() {
            '1' => Key1,
            '2' => Key2,
            '3' => Key3,
            '4' => Key4,
            '5' => Key5,
            '6' => Key6,
            '7' => Key7,
            '8' => Key8,
            '9' => Key9,
            '0' => Key0,
            '*' => KeyAsterisk,
            '#' => KeyHash,
            'A' => KeyA,
            'B' => KeyB,
            'C' => KeyC,
            'D' => KeyD,
            _ => {
                return Err(ExpanderError::Configuration(format!(
                    "unknown key symbol {:?}",
                    c
                )));
            }
        })
    }
}

impl Display for KeypadKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Maps (row, column) positions of a 4x4 matrix to keys.
///
/// Every position always holds a key, so lookups inside the matrix never miss.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyMap {
    keys: [[KeypadKey; 4]; 4],
}

impl KeyMap {
    pub const ROWS: usize = 4;
    pub const COLS: usize = 4;

    /// The common membrane keypad layout:
    /// ```text
    /// 1 2 3 A
    /// 4 5 6 B
    /// 7 8 9 C
    /// * 0 # D
    /// ```
    pub const STANDARD: KeyMap = {
        use KeypadKey::*;

        KeyMap::new([
            [Key1, Key2, Key3, KeyA],
            [Key4, Key5, Key6, KeyB],
            [Key7, Key8, Key9, KeyC],
            [KeyAsterisk, Key0, KeyHash, KeyD],
        ])
    };

    pub const fn new(keys: [[KeypadKey; 4]; 4]) -> Self {
        KeyMap { keys }
    }

    /// Builds a key map from one string per row, e.g. `["123A", "456B", "789C", "*0#D"]`.
    ///
    /// Whitespace inside a row is ignored.
    ///
    /// # Errors
    /// - `ExpanderError::Configuration` unless there are exactly four rows of four known symbols.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> ExpanderResult<Self> {
        if rows.len() != Self::ROWS {
            return Err(ExpanderError::Configuration(format!(
                "keymap needs {} rows, got {}",
                Self::ROWS,
                rows.len()
            )));
        }

        let mut keys = Self::STANDARD.keys;
        for (row, symbols) in rows.iter().enumerate() {
            let symbols: Vec<char> = symbols
                .as_ref()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            if symbols.len() != Self::COLS {
                return Err(ExpanderError::Configuration(format!(
                    "keymap row {} needs {} keys, got {}",
                    row,
                    Self::COLS,
                    symbols.len()
                )));
            }
            for (col, &symbol) in symbols.iter().enumerate() {
                keys[row][col] = KeypadKey::try_from(symbol)?;
            }
        }

        Ok(KeyMap { keys })
    }

    pub fn get(&self, row: usize, col: usize) -> Option<KeypadKey> {
        self.keys.get(row)?.get(col).copied()
    }

    /// Finds the first position holding `key`, in scan order.
    pub fn position(&self, key: KeypadKey) -> Option<(usize, usize)> {
        self.keys.iter().enumerate().find_map(|(row, keys)| {
            keys.iter()
                .position(|&k| k == key)
                .map(|col| (row, col))
        })
    }

    /// The map as one string per row, the inverse of [KeyMap::from_rows].
    pub fn to_rows(&self) -> Vec<String> {
        self.keys
            .iter()
            .map(|row| row.iter().map(|key| key.to_char()).collect())
            .collect()
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        KeyMap::STANDARD
    }
}
