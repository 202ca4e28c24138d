use mcpad_gpio::ExpanderResult;
use mcpad_gpio::i2c::ChipAddress;
use mcpad_gpio::keypad::KeyMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Settings as stored in the JSON config file. Missing fields take their defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// The I2C bus device.
    pub device: String,
    /// Chip address, hex (`0x20`) or decimal.
    pub address: String,
    pub poll_ms: u64,
    pub settle_us: u64,
    pub debounce_ms: u64,
    pub release_ms: u64,
    /// One string of four key symbols per row.
    pub keymap: Vec<String>,
}

/// Validated settings, ready to drive the hardware.
#[derive(Debug, Clone)]
pub struct Settings {
    pub device: PathBuf,
    pub address: ChipAddress,
    pub keymap: KeyMap,
    pub poll_interval: Duration,
    pub settle_time: Duration,
    pub debounce_time: Duration,
    pub release_time: Duration,
}

impl Config {
    /// Loads the config from `path`, or returns `None` if there is no such file.
    pub fn try_load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_owned(),
                source,
            })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let file = File::create(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Validates the config. Nothing here touches the bus.
    pub fn settings(&self) -> ExpanderResult<Settings> {
        Ok(Settings {
            device: PathBuf::from(&self.device),
            address: self.address.parse()?,
            keymap: KeyMap::from_rows(self.keymap.as_slice())?,
            poll_interval: Duration::from_millis(self.poll_ms.max(1)),
            settle_time: Duration::from_micros(self.settle_us),
            debounce_time: Duration::from_millis(self.debounce_ms),
            release_time: Duration::from_millis(self.release_ms),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device: "/dev/i2c-3".to_string(),
            address: "0x20".to_string(),
            poll_ms: 5,
            settle_us: 300,
            debounce_ms: 20,
            release_ms: 30,
            keymap: KeyMap::STANDARD.to_rows(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpad_gpio::ExpanderError;
    use mcpad_gpio::keypad::KeypadKey;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        let settings = Config::default().settings().unwrap();
        assert_eq!(settings.device, PathBuf::from("/dev/i2c-3"));
        assert_eq!(settings.address.get(), 0x20);
        assert_eq!(settings.keymap, KeyMap::STANDARD);
        assert_eq!(settings.poll_interval, Duration::from_millis(5));
        assert_eq!(settings.settle_time, Duration::from_micros(300));
        assert_eq!(settings.debounce_time, Duration::from_millis(20));
        assert_eq!(settings.release_time, Duration::from_millis(30));
    }

    #[test]
    fn poll_interval_is_at_least_one_millisecond() {
        let config = Config {
            poll_ms: 0,
            ..Config::default()
        };
        assert_eq!(
            config.settings().unwrap().poll_interval,
            Duration::from_millis(1)
        );
    }

    #[test]
    fn invalid_address_or_keymap_is_a_configuration_error() {
        let config = Config {
            address: "0x80".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.settings(),
            Err(ExpanderError::Configuration(_))
        ));

        let config = Config {
            keymap: vec!["123A".to_string()],
            ..Config::default()
        };
        assert!(matches!(
            config.settings(),
            Err(ExpanderError::Configuration(_))
        ));
    }

    #[test]
    fn missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::try_load(&dir.path().join("mcpad.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcpad.json");
        let config = Config {
            address: "0x21".to_string(),
            keymap: vec![
                "DCBA".to_string(),
                "#963".to_string(),
                "0852".to_string(),
                "*741".to_string(),
            ],
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::try_load(&path).unwrap(), Some(config));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r##"{{ "address": "33", "keymap": ["DCBA", "#963", "0852", "*741"] }}"##)
            .unwrap();
        let config = Config::try_load(file.path()).unwrap().unwrap();
        assert_eq!(config.device, "/dev/i2c-3");
        let settings = config.settings().unwrap();
        assert_eq!(settings.address.get(), 33);
        assert_eq!(settings.keymap.get(0, 0), Some(KeypadKey::KeyD));
    }

    #[test]
    fn malformed_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            Config::try_load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
