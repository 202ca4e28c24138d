use crate::i2c::{ChipAddress, I2cBus, I2cDevice};
use crate::{ExpanderError, ExpanderResult};
use i2cdev::core::{I2CMessage, I2CTransfer};
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CMessage};
use log::debug;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};

/// I2C bus backed by a Linux `i2c-dev` character device, such as `/dev/i2c-1`.
pub struct LinuxI2cBus {
    path: PathBuf,
}

impl LinuxI2cBus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LinuxI2cBus { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Debug for LinuxI2cBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LinuxI2cBus({})", self.path.display())
    }
}

impl I2cBus for LinuxI2cBus {
    type Device = LinuxI2cDevice;

    fn open(&self, address: ChipAddress) -> ExpanderResult<LinuxI2cDevice> {
        let device = LinuxI2CDevice::new(&self.path, address.get() as u16).map_err(|err| {
            ExpanderError::BusOpenFailed(format!(
                "{} for device {}: {}",
                self.path.display(),
                address,
                err
            ))
        })?;

        debug!("Opened {} for device {}", self.path.display(), address);

        Ok(LinuxI2cDevice {
            device,
            path: self.path.clone(),
            address,
        })
    }
}

/// Fails unless `done` of `expected` parts of a transfer went through.
fn check_len(what: &str, done: usize, expected: usize) -> ExpanderResult<()> {
    if done != expected {
        return Err(ExpanderError::TransactionFailed(format!(
            "{}: short transfer ({} of {})",
            what, done, expected
        )));
    }
    Ok(())
}

/// An open `i2c-dev` handle bound to one slave address.
///
/// Each read or write is issued as a single-message transfer, so the kernel reports how many
/// messages completed. The handle is closed when this is dropped.
pub struct LinuxI2cDevice {
    device: LinuxI2CDevice,
    path: PathBuf,
    address: ChipAddress,
}

impl LinuxI2cDevice {
    fn transfer(&mut self, what: &str, message: LinuxI2CMessage<'_>) -> ExpanderResult<()> {
        let message = message.with_address(self.address.get() as u16);
        let done = self
            .device
            .transfer(&mut [message])
            .map_err(|err| ExpanderError::transaction(what, err))?;
        check_len(what, done as usize, 1)
    }
}

impl Debug for LinuxI2cDevice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LinuxI2cDevice({}@{})", self.path.display(), self.address)
    }
}

impl I2cDevice for LinuxI2cDevice {
    fn write(&mut self, bytes: &[u8]) -> ExpanderResult<()> {
        self.transfer("i2c write", LinuxI2CMessage::write(bytes))
    }

    fn read(&mut self, buffer: &mut [u8]) -> ExpanderResult<()> {
        self.transfer("i2c read", LinuxI2CMessage::read(buffer))
    }
}
