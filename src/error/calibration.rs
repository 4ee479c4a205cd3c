// Calibration error types and constants

use crate::error::{ErrorCode, InteractionError, SensorError};
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// Error code range: 2001-2005
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// Closed and open references are equal; no usable threshold exists
    pub const NO_DISCRIMINABLE_SIGNAL: i32 = 2001;

    /// Sample count or strategy parameter out of range
    pub const INVALID_PARAMETER: i32 = 2002;

    /// Reading a reference sample failed
    pub const SENSOR: i32 = 2003;

    /// Session interrupt asserted during calibration
    pub const INTERRUPTED: i32 = 2004;

    /// Operator input closed before calibration finished
    pub const INPUT_CLOSED: i32 = 2005;
}

/// Log a calibration error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=CalibrationEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// All variants are fatal to the current session; a degenerate threshold is
/// never returned.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Closed and open references are identical
    NoDiscriminableSignal { reference: f64 },

    /// Calibration parameters are out of range
    InvalidParameter { reason: String },

    /// Sensor read failed while collecting references
    Sensor(SensorError),

    /// Calibration was interrupted by the operator
    Interrupted,

    /// Confirmation input closed before calibration finished
    InputClosed,
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::NoDiscriminableSignal { .. } => {
                CalibrationErrorCodes::NO_DISCRIMINABLE_SIGNAL
            }
            CalibrationError::InvalidParameter { .. } => CalibrationErrorCodes::INVALID_PARAMETER,
            CalibrationError::Sensor(_) => CalibrationErrorCodes::SENSOR,
            CalibrationError::Interrupted => CalibrationErrorCodes::INTERRUPTED,
            CalibrationError::InputClosed => CalibrationErrorCodes::INPUT_CLOSED,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::NoDiscriminableSignal { reference } => format!(
                "No discriminable signal: closed and open references both read {}. Check the sensor placement and light source.",
                reference
            ),
            CalibrationError::InvalidParameter { reason } => {
                format!("Invalid calibration parameter: {}", reason)
            }
            CalibrationError::Sensor(err) => err.message(),
            CalibrationError::Interrupted => "Calibration interrupted".to_string(),
            CalibrationError::InputClosed => {
                "Input closed before calibration finished".to_string()
            }
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CalibrationError::Sensor(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SensorError> for CalibrationError {
    fn from(err: SensorError) -> Self {
        CalibrationError::Sensor(err)
    }
}

impl From<InteractionError> for CalibrationError {
    fn from(err: InteractionError) -> Self {
        match err {
            InteractionError::Interrupted => CalibrationError::Interrupted,
            InteractionError::InputClosed => CalibrationError::InputClosed,
        }
    }
}
