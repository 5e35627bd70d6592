use anyhow::{Context, Result};
use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};
use std::io;
use tracing::warn;

use super::LedBus;
use crate::config::BusConfig;
use crate::error::{StripError, StripResult};

/// Default spidev kernel buffer size (`spidev.bufsiz`). Longer frames go out
/// as several back-to-back ioctls, and the strip latches a partial frame if
/// the gap between two of them exceeds 500us. Raise `spidev.bufsiz` for strips
/// over 1365 LEDs.
const MAX_TRANSFER_BYTES: usize = 4096;

/// Split a frame into the pieces sent per ioctl
fn frame_chunks(bytes: &[u8]) -> std::slice::Chunks<'_, u8> {
    bytes.chunks(MAX_TRANSFER_BYTES)
}

/// WS2801 clock+data over a Linux spidev node
pub struct SpiBus {
    device: Spidev,
    path: String,
    speed_hz: u32,
    /// MISO is unused by the strip; full-duplex transfers need somewhere to land
    rx: Vec<u8>,
    split_warned: bool,
}

impl SpiBus {
    pub fn open(config: &BusConfig) -> Result<Self> {
        let mut device = Spidev::open(&config.device)
            .context(format!("Failed to open SPI device {}", config.device))?;

        let mode = match config.mode {
            0 => SpiModeFlags::SPI_MODE_0,
            1 => SpiModeFlags::SPI_MODE_1,
            2 => SpiModeFlags::SPI_MODE_2,
            _ => SpiModeFlags::SPI_MODE_3,
        };

        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(config.speed_hz)
            .lsb_first(false)
            .mode(mode)
            .build();
        device
            .configure(&options)
            .context(format!("Failed to configure SPI device {}", config.device))?;

        Ok(SpiBus {
            device,
            path: config.device.clone(),
            speed_hz: config.speed_hz,
            rx: vec![0; MAX_TRANSFER_BYTES],
            split_warned: false,
        })
    }

    /// Change the clock rate, used by the probe speed sweep
    pub fn set_speed(&mut self, speed_hz: u32) -> io::Result<()> {
        let options = SpidevOptions::new().max_speed_hz(speed_hz).build();
        self.device.configure(&options)?;
        self.speed_hz = speed_hz;
        Ok(())
    }
}

impl LedBus for SpiBus {
    fn transfer(&mut self, bytes: &[u8]) -> StripResult<()> {
        if bytes.len() > MAX_TRANSFER_BYTES && !self.split_warned {
            warn!(
                "{} byte frame exceeds the {} byte spidev buffer and is split across transfers",
                bytes.len(),
                MAX_TRANSFER_BYTES
            );
            self.split_warned = true;
        }

        for chunk in frame_chunks(bytes) {
            let rx = &mut self.rx[..chunk.len()];
            let mut transfer = SpidevTransfer::read_write(chunk, rx);
            self.device
                .transfer(&mut transfer)
                .map_err(|e| StripError::bus(format!("SPI transfer on {} failed: {}", self.path, e)))?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("spi {} @ {} Hz", self.path, self.speed_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_strip_fits_one_transfer() {
        let frame = vec![0xAB; 850 * 3];
        let chunks: Vec<&[u8]> = frame_chunks(&frame).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 2550);
    }

    #[test]
    fn test_long_frame_is_split_in_order() {
        let frame: Vec<u8> = (0..1500 * 3).map(|i| (i % 251) as u8).collect();
        let chunks: Vec<&[u8]> = frame_chunks(&frame).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), MAX_TRANSFER_BYTES);
        assert_eq!(chunks[1].len(), 1500 * 3 - MAX_TRANSFER_BYTES);
        assert_eq!(chunks.concat(), frame);
    }
}
