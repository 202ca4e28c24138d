//! The outer polling loop.
use crate::cancel::StopToken;
use crate::debounce::{DebouncedKeypad, KeyEvent};
use crate::keypad::Keypad;
use crate::ExpanderResult;
use log::{error, info};
use std::fmt::Debug;
use std::thread::sleep;
use std::time::Duration;

/// Polls `keypad` every `poll_interval` until `stop` is set, handing each event to `on_event`.
///
/// The stop request is checked once per cycle, before scanning, so a cycle that already started
/// always completes. Any scan error ends the loop and is returned; the caller owns the bus and
/// is responsible for releasing it.
///
/// Returns the number of completed cycles.
pub fn run<K, F>(
    keypad: &mut DebouncedKeypad<'_, K>,
    poll_interval: Duration,
    stop: &StopToken,
    mut on_event: F,
) -> ExpanderResult<u64>
where
    K: Keypad + ?Sized,
    K::Key: Copy + Eq + Debug,
    F: FnMut(KeyEvent<K::Key>),
{
    info!("Scanning {:?} every {:?}.", keypad, poll_interval);

    let mut cycles = 0u64;
    while !stop.is_stopped() {
        let event = keypad
            .poll()
            .inspect_err(|err| error!("Scan aborted after {} cycles: {}", cycles, err))?;
        if let Some(event) = event {
            on_event(event);
        }
        cycles += 1;
        sleep(poll_interval);
    }

    info!("Scan loop stopped after {} cycles.", cycles);
    Ok(cycles)
}
