use anyhow::Result;
use std::thread;
use std::time::Duration;

use crate::config::{BusConfig, BusKind};
use crate::error::StripResult;

mod serial;
#[cfg(target_os = "linux")]
mod spi;

#[cfg(test)]
pub mod recording;

pub use serial::SerialBus;
#[cfg(target_os = "linux")]
pub use spi::SpiBus;

/// Synchronous byte transport to the strip
pub trait LedBus: Send {
    /// Shift `bytes` out in one transfer, blocking until done
    fn transfer(&mut self, bytes: &[u8]) -> StripResult<()>;

    /// Commit the shifted data: hold the clock idle for `pause`, then send a zero byte
    fn latch(&mut self, pause: Duration) -> StripResult<()> {
        thread::sleep(pause);
        self.transfer(&[0x00])
    }

    /// Short human-readable name for logs
    fn describe(&self) -> String;
}

/// Open the bus selected by the configuration
pub fn open(config: &BusConfig) -> Result<Box<dyn LedBus>> {
    match config.kind {
        BusKind::Spi => open_spi(config),
        BusKind::Serial => Ok(Box::new(SerialBus::open(config)?)),
    }
}

#[cfg(target_os = "linux")]
fn open_spi(config: &BusConfig) -> Result<Box<dyn LedBus>> {
    Ok(Box::new(SpiBus::open(config)?))
}

#[cfg(not(target_os = "linux"))]
fn open_spi(config: &BusConfig) -> Result<Box<dyn LedBus>> {
    anyhow::bail!(
        "SPI device {} is only supported on Linux; use the serial bus instead",
        config.device
    )
}
