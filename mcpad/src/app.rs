//! Runs the keypad on a bus and prints the confirmed events.

use crate::config::Settings;
use log::{info, warn};
use mcpad_gpio::cancel::StopToken;
use mcpad_gpio::debounce::{DebouncedKeypad, KeyEvent};
use mcpad_gpio::i2c::I2cBus;
use mcpad_gpio::i2c::sim::SimulatedBus;
use mcpad_gpio::keypad::{KeyMap, KeypadKey, Mcp23017Keypad};
use mcpad_gpio::mcp23017::Mcp23017;
use mcpad_gpio::{ExpanderResult, scanner};
use std::io::BufRead;
use std::thread;
use std::time::Duration;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

const TIMESTAMP: &[BorrowedFormatItem<'_>] =
    format_description!("[hour]:[minute]:[second].[subsecond digits:3]");

/// Opens the expander on `bus` and scans until `stop` is set.
///
/// The bus is released before returning, whether the scan stopped cleanly or failed.
pub fn run<B: I2cBus>(
    bus: B,
    settings: &Settings,
    offset: UtcOffset,
    stop: &StopToken,
) -> ExpanderResult<()> {
    let mut expander = Mcp23017::new(bus, settings.address);
    expander.open()?;

    let result = scan(&mut expander, settings, offset, stop);
    expander.close();

    let cycles = result?;
    info!("Scanned {} cycles.", cycles);
    Ok(())
}

fn scan<B: I2cBus>(
    expander: &mut Mcp23017<B>,
    settings: &Settings,
    offset: UtcOffset,
    stop: &StopToken,
) -> ExpanderResult<u64> {
    let bus_name = format!("{:?}", expander.bus());
    let address = expander.address();

    let mut keypad = Mcp23017Keypad::new(expander, settings.keymap.clone())
        .with_settle_time(settings.settle_time);
    keypad.init()?;

    println!("MCP23017 keypad started");
    println!("  Bus     : {}", bus_name);
    println!("  Address : {}", address);
    println!("Press Ctrl+C to stop.");

    let mut debounced = DebouncedKeypad::new(&mut keypad)
        .with_debounce_time(settings.debounce_time)
        .with_release_time(settings.release_time);

    scanner::run(&mut debounced, settings.poll_interval, stop, |event| {
        // The offset was read once at startup, so a DST change mid-run is not picked up.
        let now = OffsetDateTime::now_utc().to_offset(offset);
        println!("{}", format_event(event, now));
    })
}

pub fn format_event(event: KeyEvent<KeypadKey>, at: OffsetDateTime) -> String {
    let stamp = at.format(TIMESTAMP).unwrap_or_default();
    let action = match event {
        KeyEvent::Pressed(_) => "Pressed",
        KeyEvent::Released(_) => "Released",
    };
    format!("[{}] {}: {}", stamp, action, event.key())
}

/// Taps the simulated key for every symbol typed on stdin.
pub fn feed_stdin(bus: SimulatedBus, keymap: KeyMap) {
    const HOLD: Duration = Duration::from_millis(150);
    const GAP: Duration = Duration::from_millis(100);

    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            for symbol in line.chars().filter(|c| !c.is_whitespace()) {
                let position = KeypadKey::try_from(symbol)
                    .ok()
                    .and_then(|key| keymap.position(key));
                match position {
                    Some((row, col)) => {
                        bus.press(row, col);
                        thread::sleep(HOLD);
                        bus.release(row, col);
                        thread::sleep(GAP);
                    }
                    None => warn!("{:?} is not on the keypad.", symbol),
                }
            }
        }
    });
}
