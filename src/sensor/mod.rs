//! Sensor channel abstraction.
//!
//! The measurement engine only needs one capability from the hardware: a
//! blocking read that yields the current analog level. Bus setup, gain and
//! data rate belong to the concrete backends and are fixed once the channel
//! is opened.

use crate::config::{SensorBackend, SensorConfig};
use crate::error::SensorError;

pub mod ads1115;
pub mod simulated;

pub use ads1115::Ads1115Channel;
pub use simulated::{ShutterControl, ShutterMode, SimulatedShutter};

/// A single analog input that can be sampled on demand.
///
/// `sample()` blocks for as long as the underlying converter needs; callers
/// must not assume a fixed sample period.
pub trait SensorChannel: Send {
    /// Read the current level as a raw converter code.
    fn sample(&mut self) -> Result<f64, SensorError>;

    /// Convert a raw code to volts, when the backend knows its scale.
    fn to_volts(&self, _raw: f64) -> Option<f64> {
        None
    }

    /// Short description for logs.
    fn describe(&self) -> String;
}

impl<T: SensorChannel + ?Sized> SensorChannel for Box<T> {
    fn sample(&mut self) -> Result<f64, SensorError> {
        (**self).sample()
    }

    fn to_volts(&self, raw: f64) -> Option<f64> {
        (**self).to_volts(raw)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Open the hardware channel described by `config`.
///
/// The simulated backend is built through [`SimulatedShutter::new`] instead,
/// because its operator needs the [`ShutterControl`] handle.
pub fn open_hardware(config: &SensorConfig) -> Result<Box<dyn SensorChannel>, SensorError> {
    match config.backend {
        SensorBackend::Ads1115 => Ok(Box::new(Ads1115Channel::open(config)?)),
        SensorBackend::Simulated => Err(SensorError::DriverUnavailable {
            details: "simulated backend has no hardware channel".to_string(),
        }),
    }
}
