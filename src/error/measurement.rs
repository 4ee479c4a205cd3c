// Measurement error types and constants
//
// Shared by the timing state machine, the classifier and the trace recorder.

use crate::error::{ErrorCode, InteractionError, SensorError};
use log::error;
use std::fmt;

/// Measurement error code constants
///
/// Error code range: 3001-3005
pub struct MeasurementErrorCodes {}

impl MeasurementErrorCodes {
    /// A non-positive or non-finite duration reached the classifier
    pub const INVALID_DURATION: i32 = 3001;

    /// The trace recorder stopped before taking a sample
    pub const EMPTY_CAPTURE: i32 = 3002;

    /// Sensor read failed mid-measurement
    pub const SENSOR: i32 = 3003;

    /// Session interrupt asserted
    pub const INTERRUPTED: i32 = 3004;

    /// Operator input closed before the measurement could start or stop
    pub const INPUT_CLOSED: i32 = 3005;
}

/// Log a measurement error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_measurement_error(err: &MeasurementError, context: &str) {
    error!(
        "Measurement error in {}: code={}, component=Measurement, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Measurement-related errors
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementError {
    /// Duration was zero, negative or not finite
    InvalidDuration { seconds: f64 },

    /// Stop was asserted before the first sample was taken
    EmptyCapture,

    /// Sensor read failed; the current measurement or trace is abandoned
    Sensor(SensorError),

    /// The session interrupt was asserted
    Interrupted,

    /// Operator input closed
    InputClosed,
}

impl ErrorCode for MeasurementError {
    fn code(&self) -> i32 {
        match self {
            MeasurementError::InvalidDuration { .. } => MeasurementErrorCodes::INVALID_DURATION,
            MeasurementError::EmptyCapture => MeasurementErrorCodes::EMPTY_CAPTURE,
            MeasurementError::Sensor(_) => MeasurementErrorCodes::SENSOR,
            MeasurementError::Interrupted => MeasurementErrorCodes::INTERRUPTED,
            MeasurementError::InputClosed => MeasurementErrorCodes::INPUT_CLOSED,
        }
    }

    fn message(&self) -> String {
        match self {
            MeasurementError::InvalidDuration { seconds } => {
                format!("Invalid duration: {} s (must be positive and finite)", seconds)
            }
            MeasurementError::EmptyCapture => {
                "Capture stopped before any sample was taken".to_string()
            }
            MeasurementError::Sensor(err) => err.message(),
            MeasurementError::Interrupted => "Measurement interrupted".to_string(),
            MeasurementError::InputClosed => "Input closed during measurement".to_string(),
        }
    }
}

impl fmt::Display for MeasurementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MeasurementError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for MeasurementError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MeasurementError::Sensor(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SensorError> for MeasurementError {
    fn from(err: SensorError) -> Self {
        MeasurementError::Sensor(err)
    }
}

impl From<InteractionError> for MeasurementError {
    fn from(err: InteractionError) -> Self {
        match err {
            InteractionError::Interrupted => MeasurementError::Interrupted,
            InteractionError::InputClosed => MeasurementError::InputClosed,
        }
    }
}
