// Sensor error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Sensor error code constants
///
/// Error code range: 1001-1003
pub struct SensorErrorCodes {}

impl SensorErrorCodes {
    /// Sensor driver (kernel interface or backend) is not present
    pub const DRIVER_UNAVAILABLE: i32 = 1001;

    /// Bus or transport could not be opened or configured
    pub const BUS_INITIALIZATION: i32 = 1002;

    /// A single read from the converter failed
    pub const READ_FAILED: i32 = 1003;
}

/// Log a sensor error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_sensor_error(err: &SensorError, context: &str) {
    error!(
        "Sensor error in {}: code={}, component=SensorChannel, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Sensor-related errors
///
/// `DriverUnavailable` and `BusInitialization` are fatal at startup.
/// `ReadFailed` is transient: the live monitor retries after a backoff, while
/// measurement and trace capture abort the current operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorError {
    /// The sensor interface is not present on this system
    DriverUnavailable { details: String },

    /// The underlying bus could not be opened or the converter configured
    BusInitialization { details: String },

    /// A read from the converter failed
    ReadFailed { details: String },
}

impl ErrorCode for SensorError {
    fn code(&self) -> i32 {
        match self {
            SensorError::DriverUnavailable { .. } => SensorErrorCodes::DRIVER_UNAVAILABLE,
            SensorError::BusInitialization { .. } => SensorErrorCodes::BUS_INITIALIZATION,
            SensorError::ReadFailed { .. } => SensorErrorCodes::READ_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            SensorError::DriverUnavailable { details } => {
                format!("Sensor driver unavailable: {}", details)
            }
            SensorError::BusInitialization { details } => {
                format!("Bus initialization failed: {}", details)
            }
            SensorError::ReadFailed { details } => format!("Sensor read failed: {}", details),
        }
    }
}

impl SensorError {
    /// Whether the error should be retried by a monitoring loop
    pub fn is_transient(&self) -> bool {
        matches!(self, SensorError::ReadFailed { .. })
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SensorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SensorError {}
