mod key;
mod mcp23017;

use crate::ExpanderResult;
use std::fmt::Debug;
pub use key::*;
pub use mcp23017::*;

/// The `Keypad` trait defines the interface for keypad input devices.
pub trait Keypad: Debug {
    type Key;

    /// Performs one full scan and returns the first key found held down, if any.
    ///
    /// Only a single key is reported, when several are held the scan order decides which.
    fn read(&mut self) -> ExpanderResult<Option<Self::Key>>;
}
