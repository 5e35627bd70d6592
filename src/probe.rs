use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::bus::{self, LedBus};
use crate::config::{BusKind, Config};
use crate::show::ShowPlayer;
use crate::strip::StripController;

/// Bus self-test: raw red pattern, speed sweep, optional colour cycle
pub fn run(config: &Config, leds: usize, colors: bool) -> Result<()> {
    info!("=== WS2801 bus probe ===");

    let mut bus = bus::open(&config.bus).context("Could not open the LED bus")?;
    info!("✓ Opened {}", bus.describe());

    // Raw data, no gamma: red on the first `leds` LEDs
    let red: Vec<u8> = [0xFF, 0x00, 0x00].repeat(leds);
    bus.transfer(&red).context("Test transfer failed")?;
    bus.latch(config.bus.latch()).context("Latch failed")?;
    info!("✓ Sent red to {} LEDs", leds);

    if config.bus.kind == BusKind::Spi {
        // The sweep reconfigures the device, so release it first
        drop(bus);
        speed_sweep(config);
        bus = bus::open(&config.bus).context("Could not reopen the LED bus")?;
    } else {
        info!("Speed sweep skipped for serial bus");
    }

    if colors {
        let mut strip_config = config.clone();
        strip_config.strip.led_count = leds;
        let strip = StripController::from_config(bus, &strip_config)?.into_shared();
        let player = ShowPlayer::new(strip);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .context("Failed to start runtime")?;
        runtime.block_on(player.test_colors(&config.test_pattern))?;
    }

    info!("=== Probe completed ===");
    Ok(())
}

/// Time a 100-LED transfer at several clock rates
#[cfg(target_os = "linux")]
fn speed_sweep(config: &Config) {
    use std::time::Instant;

    const SPEEDS_HZ: &[u32] = &[500_000, 1_000_000, 2_000_000, 4_000_000];
    const SWEEP_LEDS: usize = 100;

    let payload: Vec<u8> = [0xFF, 0x00, 0x00].repeat(SWEEP_LEDS);

    let mut spi = match bus::SpiBus::open(&config.bus) {
        Ok(spi) => spi,
        Err(e) => {
            warn!("Speed sweep skipped: {:#}", e);
            return;
        }
    };

    for &speed in SPEEDS_HZ {
        if let Err(e) = spi.set_speed(speed) {
            warn!("✗ Speed {} Hz not accepted: {}", speed, e);
            continue;
        }

        let started = Instant::now();
        match spi.transfer(&payload) {
            Ok(()) => info!(
                "✓ Speed {} Hz: {:.2}ms for {} bytes",
                speed,
                started.elapsed().as_secs_f64() * 1000.0,
                payload.len()
            ),
            Err(e) => warn!("✗ Speed {} Hz failed: {}", speed, e),
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn speed_sweep(_config: &Config) {
    warn!("Speed sweep needs Linux spidev; skipped");
}
