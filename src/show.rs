use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::TestPatternConfig;
use crate::error::{StripError, StripResult};
use crate::model::Frame;
use crate::strip::{with_strip, SharedStrip};

/// Palette cycled by the colour test, in order
pub const TEST_COLORS: [(&str, [i64; 3]); 7] = [
    ("red", [255, 0, 0]),
    ("green", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("white", [255, 255, 255]),
    ("yellow", [255, 255, 0]),
    ("magenta", [255, 0, 255]),
    ("cyan", [0, 255, 255]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowReport {
    pub frames_rendered: usize,
    pub frames_failed: usize,
}

/// Minimum wait between frames for a target frame rate
pub fn frame_delay(fps: f64) -> StripResult<Duration> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(StripError::request(format!("fps must be a positive number, got {}", fps)));
    }
    Duration::try_from_secs_f64(1.0 / fps)
        .map_err(|_| StripError::request(format!("fps {} is out of range", fps)))
}

/// Plays shows and test patterns on the shared strip, one at a time
#[derive(Clone)]
pub struct ShowPlayer {
    strip: SharedStrip,
    gate: Arc<AsyncMutex<()>>,
}

impl ShowPlayer {
    pub fn new(strip: SharedStrip) -> Self {
        ShowPlayer {
            strip,
            gate: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Play `frames` at `fps`. Each frame starts from a cleared buffer; a frame that
    /// fails to transmit is skipped and playback continues.
    pub async fn play(&self, frames: Vec<Frame>, fps: f64) -> StripResult<ShowReport> {
        let delay = frame_delay(fps)?;
        let _turn = self.gate.lock().await;

        let total = frames.len();
        let mut report = ShowReport {
            frames_rendered: 0,
            frames_failed: 0,
        };

        for (index, frame) in frames.into_iter().enumerate() {
            match with_strip(&self.strip, move |strip| strip.render_frame(&frame)).await {
                Ok(_) => {
                    report.frames_rendered += 1;
                    debug!("Frame {}/{} rendered", index + 1, total);
                }
                Err(e) => {
                    report.frames_failed += 1;
                    warn!("Frame {}/{} skipped: {}", index + 1, total, e);
                }
            }

            if index + 1 < total {
                sleep(delay).await;
            }
        }

        info!(
            "Show completed: {} frames rendered, {} failed",
            report.frames_rendered, report.frames_failed
        );
        Ok(report)
    }

    /// Start playback in the background and return immediately
    pub fn spawn(&self, frames: Vec<Frame>, fps: f64) -> JoinHandle<()> {
        let player = self.clone();
        tokio::spawn(async move {
            if let Err(e) = player.play(frames, fps).await {
                warn!("Show aborted: {}", e);
            }
        })
    }

    /// Fill the whole strip with each test colour in turn, then clear it
    pub async fn test_colors(&self, pattern: &TestPatternConfig) -> StripResult<usize> {
        let _turn = self.gate.lock().await;
        let brightness = pattern.brightness / 100.0;

        info!("Starting colour test");
        for (name, [r, g, b]) in TEST_COLORS {
            debug!("Testing colour: {}", name);
            let result = with_strip(&self.strip, move |strip| {
                strip.fill(r, g, b, brightness);
                strip.update()
            })
            .await;
            if let Err(e) = result {
                warn!("Colour {} not shown: {}", name, e);
            }
            sleep(pattern.dwell()).await;
        }

        with_strip(&self.strip, |strip| strip.clear_strip()).await?;
        info!("Colour test completed");
        Ok(TEST_COLORS.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::recording::RecordingBus;
    use crate::gamma::GammaTable;
    use crate::model::LedUpdate;
    use crate::pixel_format::ColorOrder;
    use crate::strip::{lock, StripController};

    fn player(led_count: usize) -> (ShowPlayer, SharedStrip, RecordingBus) {
        let bus = RecordingBus::new();
        let strip = StripController::new(
            Box::new(bus.clone()),
            GammaTable::new(2.8).unwrap(),
            led_count,
            ColorOrder::Rgb,
            Duration::from_micros(500),
        )
        .into_shared();
        (ShowPlayer::new(Arc::clone(&strip)), strip, bus)
    }

    fn single(index: i64) -> Frame {
        vec![LedUpdate::new(index, 255, 255, 255)]
    }

    #[test]
    fn test_frame_delay() {
        assert_eq!(frame_delay(1.0).unwrap(), Duration::from_secs(1));
        let delay = frame_delay(60.0).unwrap();
        assert!(delay > Duration::from_micros(16_666) && delay < Duration::from_micros(16_668));
        assert!(frame_delay(0.0).is_err());
        assert!(frame_delay(-30.0).is_err());
        assert!(frame_delay(f64::INFINITY).is_err());
        assert!(frame_delay(1e-300).is_err());
    }

    #[tokio::test]
    async fn test_frames_play_in_order_and_paced() {
        let (player, strip, bus) = player(3);
        let started = std::time::Instant::now();
        let report = player.play(vec![single(0), single(1), single(2)], 60.0).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(report.frames_rendered, 3);
        assert!(elapsed >= Duration::from_micros(2 * 16_666));

        let frames = bus.frames();
        assert_eq!(frames.len(), 3);
        let top = lock(&strip).gamma().correct(255);
        for (i, frame) in frames.iter().enumerate() {
            // each frame starts from a cleared buffer, so only LED i is lit
            for led in 0..3 {
                let expected = if led == i { top } else { 0 };
                assert_eq!(&frame.bytes[led * 3..led * 3 + 3], &[expected; 3]);
            }
        }

        let delay = frame_delay(60.0).unwrap();
        for pair in frames.windows(2) {
            assert!(pair[1].at.duration_since(pair[0].at) >= delay);
        }
    }

    #[tokio::test]
    async fn test_failed_frame_does_not_abort_show() {
        let (player, _strip, bus) = player(2);
        bus.fail_next(1);
        let report = player.play(vec![single(0), single(1)], 200.0).await.unwrap();

        assert_eq!(report.frames_failed, 1);
        assert_eq!(report.frames_rendered, 1);
        assert_eq!(bus.frames().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_fps_is_rejected() {
        let (player, _strip, bus) = player(1);
        assert!(player.play(vec![single(0)], 0.0).await.is_err());
        assert!(bus.transfers().is_empty());
    }

    #[tokio::test]
    async fn test_spawned_shows_run_one_after_another() {
        let (player, _strip, bus) = player(2);
        let first = player.spawn(vec![single(0), single(0)], 50.0);
        let second = player.spawn(vec![single(1), single(1)], 50.0);
        first.await.unwrap();
        second.await.unwrap();

        let lit: Vec<bool> = bus.frames().iter().map(|f| f.bytes[0] != 0).collect();
        // the two LED-0 frames are never split by an LED-1 frame
        assert!(lit == [true, true, false, false] || lit == [false, false, true, true]);
    }

    #[tokio::test]
    async fn test_color_cycle() {
        let (player, strip, bus) = player(4);
        let pattern = TestPatternConfig {
            brightness: 50.0,
            dwell_ms: 20,
        };
        let count = player.test_colors(&pattern).await.unwrap();
        assert_eq!(count, 7);

        let frames = bus.frames();
        assert_eq!(frames.len(), 8);

        let gamma = lock(&strip).gamma().clone();
        let half = gamma.correct(128);
        for ((_, rgb), frame) in TEST_COLORS.iter().zip(&frames) {
            let expected: Vec<u8> = rgb.iter().map(|&c| if c > 0 { half } else { 0 }).collect();
            for led in frame.bytes.chunks(3) {
                assert_eq!(led, &expected[..]);
            }
        }
        for pair in frames.windows(2) {
            assert!(pair[1].at.duration_since(pair[0].at) >= pattern.dwell());
        }
        assert!(frames[7].bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_default_dwell_is_one_second() {
        assert_eq!(TestPatternConfig::default().dwell(), Duration::from_millis(1000));
    }
}
