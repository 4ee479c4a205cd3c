// Error types for the shutter tester
//
// This module defines custom error types for sensor access, calibration and
// measurement, each carrying a stable numeric code for scripting and exit
// status reporting.

mod calibration;
mod interaction;
mod measurement;
mod sensor;

pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use interaction::{InteractionError, InteractionErrorCodes};
pub use measurement::{log_measurement_error, MeasurementError, MeasurementErrorCodes};
pub use sensor::{log_sensor_error, SensorError, SensorErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent reporting from the CLI.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
