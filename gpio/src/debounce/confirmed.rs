use crate::keypad::Keypad;
use crate::ExpanderResult;
use log::{debug, trace};
use std::fmt::{Debug, Formatter};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// A confirmed change of a key's state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KeyEvent<K> {
    Pressed(K),
    Released(K),
}

impl<K> KeyEvent<K> {
    pub fn key(&self) -> &K {
        match self {
            KeyEvent::Pressed(key) | KeyEvent::Released(key) => key,
        }
    }
}

/// The debouncer's memory.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScanState<K> {
    /// No key is held.
    Idle,
    /// `key` was confirmed pressed at `since` and no release has been confirmed yet.
    Pressed { key: K, since: Instant },
}

/// A keypad that only reports presses and releases which survive a second, delayed scan.
///
/// A key seen while idle is scanned for again after [Self::debounce_time] and accepted only if
/// the same key shows up. A held key is considered released only if it is gone from two scans
/// [Self::release_time] apart. Only one key is tracked at a time; other keys are ignored until
/// it is released.
pub struct DebouncedKeypad<'a, K: Keypad + ?Sized> {
    keypad: &'a mut K,
    state: ScanState<K::Key>,
    pub debounce_time: Duration,
    pub release_time: Duration,
}

impl<K: Keypad + ?Sized> Debug for DebouncedKeypad<'_, K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}(debounced)", self.keypad)
    }
}

impl<'a, K> DebouncedKeypad<'a, K>
where
    K: Keypad + ?Sized,
    K::Key: Copy + Eq + Debug,
{
    pub fn new(keypad: &'a mut K) -> Self {
        Self {
            keypad,
            state: ScanState::Idle,
            debounce_time: Duration::from_millis(20),
            release_time: Duration::from_millis(30),
        }
    }

    pub fn with_debounce_time(mut self, debounce_time: Duration) -> Self {
        self.debounce_time = debounce_time;
        self
    }

    pub fn with_release_time(mut self, release_time: Duration) -> Self {
        self.release_time = release_time;
        self
    }

    pub fn state(&self) -> &ScanState<K::Key> {
        &self.state
    }

    /// Scans once and advances the state machine, returning the event it confirmed, if any.
    ///
    /// Bounce is not an error, a rejected press or release simply yields `None`.
    pub fn poll(&mut self) -> ExpanderResult<Option<KeyEvent<K::Key>>> {
        let found = self.keypad.read()?;

        match self.state {
            ScanState::Idle => {
                let Some(key) = found else {
                    return Ok(None);
                };

                sleep(self.debounce_time);
                let confirm = self.keypad.read()?;

                if confirm == Some(key) {
                    debug!("Key {:?} pressed.", key);
                    self.state = ScanState::Pressed {
                        key,
                        since: Instant::now(),
                    };
                    Ok(Some(KeyEvent::Pressed(key)))
                } else {
                    trace!("Rejected {:?} as bounce, confirmation saw {:?}.", key, confirm);
                    Ok(None)
                }
            }
            ScanState::Pressed { key, since } => {
                if let Some(other) = found {
                    if other != key {
                        trace!("Ignoring {:?} while {:?} is held.", other, key);
                    }
                    return Ok(None);
                }

                sleep(self.release_time);

                match self.keypad.read()? {
                    None => {
                        debug!("Key {:?} released after {:?}.", key, since.elapsed());
                        self.state = ScanState::Idle;
                        Ok(Some(KeyEvent::Released(key)))
                    }
                    Some(again) => {
                        trace!("Release of {:?} not confirmed, saw {:?}.", key, again);
                        Ok(None)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypad::testing::ScriptedKeypad;
    use crate::ExpanderError;

    fn debounced(keypad: &mut ScriptedKeypad) -> DebouncedKeypad<'_, ScriptedKeypad> {
        DebouncedKeypad::new(keypad)
            .with_debounce_time(Duration::ZERO)
            .with_release_time(Duration::ZERO)
    }

    fn is_pressed(state: &ScanState<char>, expected: char) -> bool {
        matches!(state, ScanState::Pressed { key, .. } if *key == expected)
    }

    #[test]
    fn idle_scan_without_key_skips_confirmation() {
        let mut keypad = ScriptedKeypad::new(&[None]);
        let mut debounced = debounced(&mut keypad);
        assert_eq!(debounced.poll().unwrap(), None);
        assert_eq!(debounced.state(), &ScanState::Idle);
        drop(debounced);
        assert_eq!(keypad.reads, 1);
    }

    #[test]
    fn confirmed_press_emits_once() {
        let mut keypad = ScriptedKeypad::new(&[Some('5'), Some('5')]);
        let mut debounced = debounced(&mut keypad);
        assert_eq!(debounced.poll().unwrap(), Some(KeyEvent::Pressed('5')));
        assert!(is_pressed(debounced.state(), '5'));
    }

    #[test]
    fn press_with_different_confirmation_is_bounce() {
        let mut keypad = ScriptedKeypad::new(&[Some('5'), Some('6')]);
        let mut debounced = debounced(&mut keypad);
        assert_eq!(debounced.poll().unwrap(), None);
        assert_eq!(debounced.state(), &ScanState::Idle);
    }

    #[test]
    fn press_with_empty_confirmation_is_bounce() {
        let mut keypad = ScriptedKeypad::new(&[Some('5'), None]);
        let mut debounced = debounced(&mut keypad);
        assert_eq!(debounced.poll().unwrap(), None);
        assert_eq!(debounced.state(), &ScanState::Idle);
    }

    #[test]
    fn held_key_does_not_repeat() {
        let mut keypad = ScriptedKeypad::new(&[Some('5'), Some('5'), Some('5'), Some('5')]);
        let mut debounced = debounced(&mut keypad);
        assert_eq!(debounced.poll().unwrap(), Some(KeyEvent::Pressed('5')));
        assert_eq!(debounced.poll().unwrap(), None);
        assert_eq!(debounced.poll().unwrap(), None);
        assert!(is_pressed(debounced.state(), '5'));
        drop(debounced);
        assert_eq!(keypad.remaining(), 0);
    }

    #[test]
    fn other_key_while_held_is_ignored() {
        let mut keypad = ScriptedKeypad::new(&[Some('5'), Some('5'), Some('6')]);
        let mut debounced = debounced(&mut keypad);
        debounced.poll().unwrap();
        assert_eq!(debounced.poll().unwrap(), None);
        assert!(is_pressed(debounced.state(), '5'));
    }

    #[test]
    fn confirmed_release_emits_once() {
        let mut keypad = ScriptedKeypad::new(&[Some('5'), Some('5'), None, None, None]);
        let mut debounced = debounced(&mut keypad);
        assert_eq!(debounced.poll().unwrap(), Some(KeyEvent::Pressed('5')));
        let released = debounced.poll().unwrap().unwrap();
        assert_eq!(released, KeyEvent::Released('5'));
        assert_eq!(released.key(), &'5');
        assert_eq!(debounced.state(), &ScanState::Idle);
        assert_eq!(debounced.poll().unwrap(), None);
    }

    #[test]
    fn release_with_key_in_confirmation_is_bounce() {
        let mut keypad = ScriptedKeypad::new(&[Some('5'), Some('5'), None, Some('7')]);
        let mut debounced = debounced(&mut keypad);
        debounced.poll().unwrap();
        assert_eq!(debounced.poll().unwrap(), None);
        assert!(is_pressed(debounced.state(), '5'));
    }

    #[test]
    fn scan_errors_propagate_and_keep_state() {
        let mut keypad = ScriptedKeypad::new(&[Some('5')]).then_fail();
        let mut debounced = debounced(&mut keypad);
        assert!(matches!(
            debounced.poll(),
            Err(ExpanderError::TransactionFailed(_))
        ));
        assert_eq!(debounced.state(), &ScanState::Idle);
    }

    #[test]
    fn waits_between_scan_and_confirmation() {
        let mut keypad = ScriptedKeypad::new(&[Some('5'), Some('5')]);
        let mut debounced =
            DebouncedKeypad::new(&mut keypad).with_debounce_time(Duration::from_millis(15));
        let start = Instant::now();
        debounced.poll().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
