use serde::{Deserialize, Serialize};

/// Desired colour for one LED, consumed as soon as it is applied
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct LedUpdate {
    /// Signed so that a negative index is an out-of-range warning, not a parse error
    pub index: i64,
    #[serde(default)]
    pub r: i64,
    #[serde(default)]
    pub g: i64,
    #[serde(default)]
    pub b: i64,
    /// Percent, 0-100
    #[serde(default = "full_brightness")]
    pub brightness: f64,
}

fn full_brightness() -> f64 {
    100.0
}

impl LedUpdate {
    #[allow(dead_code)]
    pub fn new(index: i64, r: i64, g: i64, b: i64) -> Self {
        LedUpdate {
            index,
            r,
            g,
            b,
            brightness: 100.0,
        }
    }

    #[allow(dead_code)]
    pub fn with_brightness(mut self, brightness: f64) -> Self {
        self.brightness = brightness;
        self
    }

    /// Brightness as a 0.0-1.0 scale factor
    pub fn brightness_factor(&self) -> f64 {
        self.brightness.clamp(0.0, 100.0) / 100.0
    }
}

/// One rendering pass
pub type Frame = Vec<LedUpdate>;

/// Body of `POST /singleFrame`
#[derive(Debug, Clone, Deserialize)]
pub struct SingleFrameRequest {
    pub array: Frame,
}

/// Body of `POST /spectacle`
#[derive(Debug, Clone, Deserialize)]
pub struct ShowRequest {
    pub array: Vec<Frame>,
    #[serde(default)]
    pub fps: Option<f64>,
}
