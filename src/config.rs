//! Configuration management for the shutter tester
//!
//! This module provides runtime configuration loading from JSON files so that
//! sensor wiring, calibration strategy and the nominal speed table can be
//! changed without recompiling. Every component receives its section
//! explicitly; nothing here is global state.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::calibration::ThresholdStrategy;
use crate::classifier::STANDARD_SHUTTER_SPEEDS;
use crate::timing::Polarity;

/// Data rates supported by the ADS1115, in samples per second
pub const ADS1115_DATA_RATES: [u16; 8] = [8, 16, 32, 64, 128, 250, 475, 860];

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sensor: SensorConfig,
    pub calibration: CalibrationConfig,
    pub timing: TimingConfig,
    pub monitor: MonitorConfig,
    pub trace: TraceConfig,
    /// Nominal shutter speeds in seconds, in tie-break order
    pub shutter_speeds: Vec<f64>,
}

/// Which sensor implementation to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorBackend {
    /// ADS1115 on a Linux i2c-dev bus
    #[default]
    Ads1115,
    /// Wall-clock driven shutter model, no hardware required
    Simulated,
}

/// ADS1115 programmable gain setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdsGain {
    TwoThirds,
    /// ±4.096 V full scale
    #[default]
    One,
    Two,
    Four,
    Eight,
    Sixteen,
}

impl AdsGain {
    /// Full-scale input range in volts for this gain
    pub fn full_scale_volts(&self) -> f64 {
        match self {
            AdsGain::TwoThirds => 6.144,
            AdsGain::One => 4.096,
            AdsGain::Two => 2.048,
            AdsGain::Four => 1.024,
            AdsGain::Eight => 0.512,
            AdsGain::Sixteen => 0.256,
        }
    }
}

/// Analog sensor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub backend: SensorBackend,
    /// Bus number N of /dev/i2c-N
    pub i2c_bus: u8,
    /// 7-bit device address
    pub address: u16,
    /// Single-ended input channel (A0..A3)
    pub input: u8,
    pub gain: AdsGain,
    /// Samples per second; 860 is required for sub-millisecond speeds
    pub data_rate: u16,
    pub simulated: SimulatedConfig,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            backend: SensorBackend::Ads1115,
            i2c_bus: 1,
            address: 0x48,
            input: 0,
            gain: AdsGain::One,
            data_rate: 860,
            simulated: SimulatedConfig::default(),
        }
    }
}

/// Parameters of the simulated shutter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedConfig {
    /// Raw level read while the shutter is closed (dark)
    pub closed_level: f64,
    /// Raw level read while the shutter is open (lit)
    pub open_level: f64,
    /// Peak uniform noise added to each reading
    pub noise: f64,
    /// How long the simulated shutter stays open per firing
    pub shutter_speed_s: f64,
    /// Time between firings
    pub period_ms: u64,
    /// Emulated conversion latency per read
    pub sample_interval_us: u64,
    /// Noise seed; entropy-seeded when absent
    pub seed: Option<u64>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            closed_level: 30_000.0,
            open_level: 2_000.0,
            noise: 150.0,
            shutter_speed_s: 1.0 / 125.0,
            period_ms: 400,
            // 860 SPS
            sample_interval_us: 1_163,
            seed: None,
        }
    }
}

/// Calibration procedure configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Number of samples averaged per reference level
    pub samples_per_reference: usize,
    pub strategy: ThresholdStrategy,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            samples_per_reference: 10,
            strategy: ThresholdStrategy::Midpoint,
        }
    }
}

/// Edge timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Which side of the threshold means "closed"
    pub polarity: Polarity,
    /// Delay between polls; 0 polls in a tight loop
    pub poll_interval_us: u64,
    /// Dead band around the threshold in sample units; 0 = first crossing wins
    pub hysteresis: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            polarity: Polarity::DarkHigh,
            poll_interval_us: 0,
            hysteresis: 0.0,
        }
    }
}

/// Live monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_ms: u64,
    /// Pause after a failed read before retrying
    pub error_backoff_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            error_backoff_ms: 1_000,
        }
    }
}

/// Raw trace capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Pre-allocated sample slots; the trace grows beyond this as needed
    pub initial_capacity: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 4_096,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sensor: SensorConfig::default(),
            calibration: CalibrationConfig::default(),
            timing: TimingConfig::default(),
            monitor: MonitorConfig::default(),
            trace: TraceConfig::default(),
            shutter_speeds: STANDARD_SHUTTER_SPEEDS.to_vec(),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// Missing sections and fields take their defaults. If the file doesn't
    /// exist or the JSON is invalid, the default configuration is returned.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        Self::load_from_file("config/shutter_tester.json")
    }

    /// Check cross-field constraints
    ///
    /// # Returns
    /// * `Ok(())` - Configuration usable
    /// * `Err(String)` - First violated constraint
    pub fn validate(&self) -> Result<(), String> {
        if self.calibration.samples_per_reference == 0 {
            return Err("calibration.samples_per_reference must be at least 1".to_string());
        }
        self.calibration
            .strategy
            .validate()
            .map_err(|err| err.to_string())?;

        if !(self.timing.hysteresis >= 0.0 && self.timing.hysteresis.is_finite()) {
            return Err(format!(
                "timing.hysteresis must be a non-negative number, got {}",
                self.timing.hysteresis
            ));
        }

        if self.sensor.input > 3 {
            return Err(format!(
                "sensor.input must be 0..=3, got {}",
                self.sensor.input
            ));
        }
        if !ADS1115_DATA_RATES.contains(&self.sensor.data_rate) {
            return Err(format!(
                "sensor.data_rate {} not supported (expected one of {:?})",
                self.sensor.data_rate, ADS1115_DATA_RATES
            ));
        }
        if self.sensor.address > 0x7F {
            return Err(format!(
                "sensor.address {:#x} is not a 7-bit address",
                self.sensor.address
            ));
        }

        let sim = &self.sensor.simulated;
        if sim.period_ms == 0 {
            return Err("sensor.simulated.period_ms must be positive".to_string());
        }
        let half_period_s = sim.period_ms as f64 / 2_000.0;
        if !(sim.shutter_speed_s > 0.0 && sim.shutter_speed_s < half_period_s) {
            return Err(format!(
                "sensor.simulated.shutter_speed_s must be in (0, {}), got {}",
                half_period_s, sim.shutter_speed_s
            ));
        }

        crate::classifier::SpeedTable::new(self.shutter_speeds.clone()).map(|_| ())
    }
}
