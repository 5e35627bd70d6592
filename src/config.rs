use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{StripError, StripResult};
use crate::pixel_format::ColorOrder;

/// WS2801 needs at least 500us of idle clock before it latches
pub const MIN_LATCH_US: u64 = 500;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub strip: StripConfig,
    pub bus: BusConfig,
    pub show: ShowConfig,
    pub test_pattern: TestPatternConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body; an 850-LED show is about 46 KB per frame
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            host: "0.0.0.0".to_string(),
            port: 5001,
            max_body_bytes: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StripConfig {
    pub led_count: usize,
    pub gamma: f64,
}

impl Default for StripConfig {
    fn default() -> Self {
        StripConfig {
            led_count: 850,
            gamma: 2.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    #[default]
    Spi,
    /// USB serial bridge speaking Adalight
    Serial,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BusConfig {
    pub kind: BusKind,
    pub device: String,
    pub speed_hz: u32,
    /// SPI mode 0-3
    pub mode: u8,
    pub latch_us: u64,
    pub baud_rate: u32,
    pub color_order: ColorOrder,
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig {
            kind: BusKind::Spi,
            device: "/dev/spidev0.0".to_string(),
            speed_hz: 1_000_000,
            mode: 0,
            latch_us: 1000,
            baud_rate: 115_200,
            color_order: ColorOrder::Rgb,
        }
    }
}

impl BusConfig {
    pub fn latch(&self) -> Duration {
        Duration::from_micros(self.latch_us)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShowConfig {
    pub default_fps: f64,
}

impl Default for ShowConfig {
    fn default() -> Self {
        ShowConfig { default_fps: 30.0 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TestPatternConfig {
    /// Percent, 0-100
    pub brightness: f64,
    pub dwell_ms: u64,
}

impl Default for TestPatternConfig {
    fn default() -> Self {
        TestPatternConfig {
            brightness: 50.0,
            dwell_ms: 1000,
        }
    }
}

impl TestPatternConfig {
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }
}

impl Config {
    pub fn from_json(data: &str) -> StripResult<Self> {
        let config: Config = serde_json::from_str(data)
            .map_err(|e| StripError::config(format!("invalid config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StripResult<()> {
        if self.http.max_body_bytes == 0 {
            return Err(StripError::config("http.max_body_bytes must be non-zero"));
        }
        if self.strip.led_count == 0 {
            return Err(StripError::config("strip.led_count must be at least 1"));
        }
        if !self.strip.gamma.is_finite() || self.strip.gamma <= 0.0 {
            return Err(StripError::config("strip.gamma must be a positive number"));
        }
        if self.bus.speed_hz == 0 {
            return Err(StripError::config("bus.speed_hz must be non-zero"));
        }
        if self.bus.mode > 3 {
            return Err(StripError::config("bus.mode must be between 0 and 3"));
        }
        if self.bus.latch_us < MIN_LATCH_US {
            return Err(StripError::config(format!(
                "bus.latch_us must be at least {}",
                MIN_LATCH_US
            )));
        }
        if self.bus.kind == BusKind::Serial && self.bus.baud_rate == 0 {
            return Err(StripError::config("bus.baud_rate must be non-zero"));
        }
        if !self.show.default_fps.is_finite() || self.show.default_fps <= 0.0 {
            return Err(StripError::config("show.default_fps must be a positive number"));
        }
        if !(0.0..=100.0).contains(&self.test_pattern.brightness) {
            return Err(StripError::config("test_pattern.brightness must be within 0-100"));
        }
        Ok(())
    }
}
