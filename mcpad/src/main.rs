mod app;
mod config;

use crate::config::Config;
use clap::Parser;
use dotenv::dotenv;
use log::{debug, info};
use mcpad_gpio::cancel::StopToken;
use mcpad_gpio::i2c::LinuxI2cBus;
use mcpad_gpio::i2c::sim::SimulatedBus;
use std::path::PathBuf;
use sysinfo::System;
use time::UtcOffset;

/// Reports debounced key presses from a 4x4 keypad on an MCP23017 I/O expander.
#[derive(Parser, Debug)]
#[command(name = "mcpad", version)]
struct Cli {
    /// I2C bus device
    #[arg(long, env = "MCPAD_DEV", value_name = "PATH")]
    dev: Option<String>,

    /// 7-bit chip address, hex (0x20) or decimal (32)
    #[arg(long, env = "MCPAD_ADDR", value_name = "ADDRESS")]
    addr: Option<String>,

    /// Delay between scan cycles, in milliseconds
    #[arg(long, env = "MCPAD_POLL_MS", value_name = "MS")]
    poll_ms: Option<u64>,

    /// JSON config file with timings and the key map
    #[arg(long, env = "MCPAD_CONFIG", default_value = "mcpad.json")]
    config: PathBuf,

    /// Scan a simulated chip instead of the bus; type key symbols on stdin to press them
    #[arg(long)]
    simulate: bool,

    /// Write the resolved configuration to the config file and exit
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    /// Overrides config file values with the ones given on the command line or in the environment.
    fn apply(&self, config: &mut Config) {
        if let Some(dev) = &self.dev {
            config.device = dev.clone();
        }
        if let Some(addr) = &self.addr {
            config.address = addr.clone();
        }
        if let Some(poll_ms) = self.poll_ms {
            config.poll_ms = poll_ms;
        }
    }
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    let cli = Cli::parse();

    // Only answerable while the process is still single-threaded.
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    const UNKNOWN_STR: &str = "???";

    info!("mcpad v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "Host {} running {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR),
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
    );

    let mut config = match Config::try_load(&cli.config)? {
        Some(config) => {
            info!("Config loaded from {}.", cli.config.display());
            config
        }
        None => {
            info!("Config not found at {}. Using defaults.", cli.config.display());
            Config::default()
        }
    };
    cli.apply(&mut config);

    let settings = config.settings()?;
    debug!("{:?}", settings);

    if cli.write_config {
        config.save(&cli.config)?;
        info!("Config written to {}.", cli.config.display());
        return Ok(());
    }

    let stop = StopToken::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.stop())?;

    if cli.simulate {
        info!("Simulating the keypad. Type key symbols and press Enter.");
        let bus = SimulatedBus::new();
        app::feed_stdin(bus.clone(), settings.keymap.clone());
        app::run(bus, &settings, offset, &stop)?;
    } else {
        app::run(LinuxI2cBus::new(&settings.device), &settings, offset, &stop)?;
    }

    println!("Stopped.");
    Ok(())
}
