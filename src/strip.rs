use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{error, trace, warn};

use crate::bus::LedBus;
use crate::config::Config;
use crate::error::{StripError, StripResult};
use crate::gamma::GammaTable;
use crate::model::LedUpdate;
use crate::pixel_format::{transform_pixels, ColorOrder};

/// Strip controller shared between request handlers and show playback
pub type SharedStrip = Arc<Mutex<StripController>>;

/// Owns the bus handle and the frame buffer (3 bytes per LED, RGB order)
pub struct StripController {
    bus: Box<dyn LedBus>,
    gamma: GammaTable,
    buffer: Vec<u8>,
    wire: Vec<u8>,
    color_order: ColorOrder,
    latch: Duration,
    frames_sent: Arc<AtomicU64>,
    frames_failed: Arc<AtomicU64>,
    closed: bool,
}

impl StripController {
    pub fn new(
        bus: Box<dyn LedBus>,
        gamma: GammaTable,
        led_count: usize,
        color_order: ColorOrder,
        latch: Duration,
    ) -> Self {
        StripController {
            bus,
            gamma,
            buffer: vec![0; led_count * 3],
            wire: Vec::with_capacity(led_count * 3),
            color_order,
            latch,
            frames_sent: Arc::new(AtomicU64::new(0)),
            frames_failed: Arc::new(AtomicU64::new(0)),
            closed: false,
        }
    }

    pub fn from_config(bus: Box<dyn LedBus>, config: &Config) -> StripResult<Self> {
        let gamma = GammaTable::new(config.strip.gamma)?;
        Ok(Self::new(
            bus,
            gamma,
            config.strip.led_count,
            config.bus.color_order,
            config.bus.latch(),
        ))
    }

    pub fn into_shared(self) -> SharedStrip {
        Arc::new(Mutex::new(self))
    }

    pub fn led_count(&self) -> usize {
        self.buffer.len() / 3
    }

    #[allow(dead_code)]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn gamma(&self) -> &GammaTable {
        &self.gamma
    }

    pub fn bus_name(&self) -> String {
        self.bus.describe()
    }

    /// Scale by brightness, clamp, gamma-correct, and store one LED.
    /// Returns false (and leaves the buffer untouched) when `index` is off the strip.
    pub fn set_pixel(&mut self, index: usize, r: i64, g: i64, b: i64, brightness: f64) -> bool {
        if index >= self.led_count() {
            warn!("LED index out of range: {} (strip has {} LEDs)", index, self.led_count());
            return false;
        }

        let offset = index * 3;
        self.buffer[offset] = self.gamma.correct(scale_channel(r, brightness));
        self.buffer[offset + 1] = self.gamma.correct(scale_channel(g, brightness));
        self.buffer[offset + 2] = self.gamma.correct(scale_channel(b, brightness));
        true
    }

    /// Apply one request-level update; negative indices are rejected like any other out-of-range index
    pub fn apply_update(&mut self, update: &LedUpdate) -> bool {
        match usize::try_from(update.index) {
            Ok(index) => self.set_pixel(index, update.r, update.g, update.b, update.brightness_factor()),
            Err(_) => {
                warn!("LED index out of range: {} (strip has {} LEDs)", update.index, self.led_count());
                false
            }
        }
    }

    /// Apply every update in order, returning how many landed on the strip
    pub fn apply_frame(&mut self, frame: &[LedUpdate]) -> usize {
        frame.iter().filter(|update| self.apply_update(update)).count()
    }

    pub fn fill(&mut self, r: i64, g: i64, b: i64, brightness: f64) {
        for index in 0..self.led_count() {
            self.set_pixel(index, r, g, b, brightness);
        }
    }

    pub fn clear_buffer(&mut self) {
        self.buffer.fill(0);
    }

    /// Clear the buffer, apply `frame`, and transmit it
    pub fn render_frame(&mut self, frame: &[LedUpdate]) -> StripResult<usize> {
        self.clear_buffer();
        let applied = self.apply_frame(frame);
        self.update()?;
        Ok(applied)
    }

    /// Transmit the whole buffer, then latch.
    /// On failure the buffer keeps the attempted frame so the next update shows it.
    pub fn update(&mut self) -> StripResult<()> {
        if self.closed {
            return Err(StripError::bus("strip is closed"));
        }

        transform_pixels(&self.buffer, self.color_order, &mut self.wire);

        trace!(
            "Sending {} bytes on {}: {}",
            self.wire.len(),
            self.bus.describe(),
            hex_preview(&self.wire, 30)
        );

        let result = self
            .bus
            .transfer(&self.wire)
            .and_then(|_| self.bus.latch(self.latch));

        match result {
            Ok(()) => {
                self.frames_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.frames_failed.fetch_add(1, Ordering::Relaxed);
                error!("Error updating LED strip on {}: {}", self.bus.describe(), e);
                Err(e)
            }
        }
    }

    /// Zero the buffer and push it so the strip goes dark
    pub fn clear_strip(&mut self) -> StripResult<()> {
        self.clear_buffer();
        self.update()
    }

    /// Darken the strip one last time; every later update is refused
    pub fn close(&mut self) -> StripResult<()> {
        let result = self.clear_strip();
        self.closed = true;
        result
    }

    #[allow(dead_code)]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn frames_failed(&self) -> u64 {
        self.frames_failed.load(Ordering::Relaxed)
    }

    /// Get a clone of the frames sent counter (for statistics)
    pub fn frames_sent_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.frames_sent)
    }
}

/// `round(channel * brightness)`, clamped into the gamma table's domain
fn scale_channel(value: i64, brightness: f64) -> u8 {
    (value as f64 * brightness).round().clamp(0.0, 255.0) as u8
}

fn hex_preview(bytes: &[u8], limit: usize) -> String {
    bytes
        .iter()
        .take(limit)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lock the controller; a panic elsewhere never leaves the buffer half-written
pub fn lock(strip: &SharedStrip) -> MutexGuard<'_, StripController> {
    strip.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Run blocking strip work (pixel writes + bus transfer) off the async reactor
pub async fn with_strip<T, F>(strip: &SharedStrip, work: F) -> StripResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut StripController) -> StripResult<T> + Send + 'static,
{
    let strip = Arc::clone(strip);
    tokio::task::spawn_blocking(move || work(&mut lock(&strip)))
        .await
        .map_err(|e| StripError::bus(format!("strip task failed: {}", e)))?
}
