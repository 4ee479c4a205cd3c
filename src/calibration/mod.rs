// Calibration module - reference levels and decision threshold
//
// Calibration runs once per session:
// 1. Operator holds the shutter closed; N samples are averaged
// 2. Operator holds the shutter open; N samples are averaged
// 3. A ThresholdStrategy places the threshold between the two references
//
// The result is read-only afterwards and handed to whichever component times
// the shutter.

pub mod procedure;
pub mod strategy;

pub use procedure::calibrate;
pub use strategy::{CalibrationResult, ThresholdStrategy};
