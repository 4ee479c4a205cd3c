//! Simulated shutter for running the tester without hardware.
//!
//! The model reads a dark level while closed and a lit level while open, with
//! uniform noise on top. While firing, the shutter opens once per period for
//! the configured speed, half a period after firing started. Each read sleeps
//! for the emulated conversion time so sample rates resemble the real ADC.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::warn;

use super::SensorChannel;
use crate::config::SimulatedConfig;
use crate::error::SensorError;

/// What the simulated shutter is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterMode {
    HeldClosed,
    HeldOpen,
    Firing,
}

#[derive(Debug)]
struct ControlState {
    mode: ShutterMode,
    since: Instant,
}

/// Handle used by the simulated operator to move the shutter.
#[derive(Debug, Clone)]
pub struct ShutterControl {
    state: Arc<Mutex<ControlState>>,
}

impl ShutterControl {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ControlState {
                mode: ShutterMode::HeldClosed,
                since: Instant::now(),
            })),
        }
    }

    /// Switch mode; firing restarts its period from now.
    pub fn set(&self, mode: ShutterMode) {
        if let Ok(mut state) = self.state.lock() {
            state.mode = mode;
            state.since = Instant::now();
        }
    }

    pub fn mode(&self) -> Option<ShutterMode> {
        self.state.lock().ok().map(|state| state.mode)
    }

    fn snapshot(&self) -> Result<(ShutterMode, Instant), SensorError> {
        self.state
            .lock()
            .map(|state| (state.mode, state.since))
            .map_err(|_| SensorError::ReadFailed {
                details: "simulated shutter state lock poisoned".to_string(),
            })
    }
}

/// Open time per firing; unrepresentable speeds fall back to the default
fn open_duration(shutter_speed_s: f64) -> Duration {
    Duration::try_from_secs_f64(shutter_speed_s).unwrap_or_else(|err| {
        let fallback = SimulatedConfig::default().shutter_speed_s;
        warn!(
            "[SimulatedShutter] shutter_speed_s {} unusable ({}); using {}",
            shutter_speed_s, err, fallback
        );
        Duration::from_secs_f64(fallback)
    })
}

/// Sensor channel backed by the shutter model.
#[derive(Debug)]
pub struct SimulatedShutter {
    control: ShutterControl,
    closed_level: f64,
    open_level: f64,
    noise: f64,
    open_for: Duration,
    period: Duration,
    sample_interval: Duration,
    rng: StdRng,
}

impl SimulatedShutter {
    pub fn new(config: &SimulatedConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            control: ShutterControl::new(),
            closed_level: config.closed_level,
            open_level: config.open_level,
            noise: config.noise.abs(),
            open_for: open_duration(config.shutter_speed_s),
            period: Duration::from_millis(config.period_ms.max(1)),
            sample_interval: Duration::from_micros(config.sample_interval_us),
            rng,
        }
    }

    pub fn control(&self) -> ShutterControl {
        self.control.clone()
    }

    /// Whether the modelled shutter is open `elapsed` after firing started.
    pub fn is_open_at(&self, elapsed: Duration) -> bool {
        let period_ns = self.period.as_nanos();
        let phase = Duration::from_nanos((elapsed.as_nanos() % period_ns) as u64);
        let opens = self.period / 2;
        phase >= opens && phase < opens + self.open_for
    }

    fn level(&self, mode: ShutterMode, since: Instant) -> f64 {
        let open = match mode {
            ShutterMode::HeldClosed => false,
            ShutterMode::HeldOpen => true,
            ShutterMode::Firing => self.is_open_at(since.elapsed()),
        };
        if open {
            self.open_level
        } else {
            self.closed_level
        }
    }
}

impl SensorChannel for SimulatedShutter {
    fn sample(&mut self) -> Result<f64, SensorError> {
        if !self.sample_interval.is_zero() {
            thread::sleep(self.sample_interval);
        }
        let (mode, since) = self.control.snapshot()?;
        let level = self.level(mode, since);
        let jitter = if self.noise > 0.0 {
            self.rng.gen_range(-self.noise..=self.noise)
        } else {
            0.0
        };
        Ok((level + jitter)
            .round()
            .clamp(f64::from(i16::MIN), f64::from(i16::MAX)))
    }

    fn to_volts(&self, raw: f64) -> Option<f64> {
        Some(raw * 4.096 / 32_768.0)
    }

    fn describe(&self) -> String {
        format!(
            "simulated shutter ({:.4}s every {}ms)",
            self.open_for.as_secs_f64(),
            self.period.as_millis()
        )
    }
}
