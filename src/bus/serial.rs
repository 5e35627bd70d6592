use anyhow::{Context, Result};
use serialport::SerialPort;
use std::io::Write;
use std::thread;
use std::time::Duration;
use tracing::warn;

use super::LedBus;
use crate::config::BusConfig;
use crate::error::{StripError, StripResult};
use crate::protocol::build_adalight_frame;

/// Strip driven through a USB serial bridge running Adalight firmware
pub struct SerialBus {
    port: Box<dyn SerialPort>,
    name: String,
    baud_rate: u32,
    frame: Vec<u8>,
}

impl SerialBus {
    pub fn open(config: &BusConfig) -> Result<Self> {
        let mut port = serialport::new(&config.device, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .open()
            .context(format!("Failed to open serial port {}", config.device))?;

        // Set write timeout to avoid blocking forever
        port.set_timeout(Duration::from_millis(1000))
            .context("Failed to set serial port timeout")?;

        // Most bridges reset on DTR and need it asserted
        if let Err(e) = port.write_data_terminal_ready(true) {
            warn!("Failed to set DTR on {}: {}", config.device, e);
        }

        // Allow device to initialize
        thread::sleep(Duration::from_millis(100));

        Ok(SerialBus {
            port,
            name: config.device.clone(),
            baud_rate: config.baud_rate,
            frame: Vec::new(),
        })
    }
}

impl LedBus for SerialBus {
    fn transfer(&mut self, bytes: &[u8]) -> StripResult<()> {
        build_adalight_frame(bytes, &mut self.frame);

        self.port
            .write_all(&self.frame)
            .and_then(|_| self.port.flush())
            .map_err(|e| StripError::bus(format!("serial write on {} failed: {}", self.name, e)))
    }

    /// The bridge latches each frame itself; only the idle gap is enforced here
    fn latch(&mut self, pause: Duration) -> StripResult<()> {
        thread::sleep(pause);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("serial {} @ {} baud", self.name, self.baud_rate)
    }
}
