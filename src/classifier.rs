//! Nominal shutter speed classification.
//!
//! A measured open duration is matched to the closest entry of a
//! [`SpeedTable`] and rendered the way shutter dials mark it: `1/125`,
//! `1/2`, `1s`. The table is passed in explicitly so different cameras (or
//! tests) can use different marked speeds side by side.

use serde::Serialize;

use crate::error::MeasurementError;
use crate::timing::Measurement;

/// Marked speeds of a typical mechanical shutter, fastest first.
pub const STANDARD_SHUTTER_SPEEDS: [f64; 11] = [
    1.0 / 1000.0,
    1.0 / 500.0,
    1.0 / 250.0,
    1.0 / 125.0,
    1.0 / 60.0,
    1.0 / 30.0,
    1.0 / 15.0,
    1.0 / 8.0,
    1.0 / 4.0,
    1.0 / 2.0,
    1.0,
];

/// Ordered set of nominal durations in seconds.
///
/// Order matters: when a duration is equally far from two entries, the one
/// that comes first wins.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedTable {
    entries: Vec<f64>,
}

impl SpeedTable {
    /// Build a table, rejecting empty tables and entries that are not
    /// positive finite numbers.
    pub fn new(entries: Vec<f64>) -> Result<Self, String> {
        if entries.is_empty() {
            return Err("shutter speed table must not be empty".to_string());
        }
        if let Some(bad) = entries.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(format!(
                "shutter speed table entries must be positive, got {}",
                bad
            ));
        }
        Ok(Self { entries })
    }

    pub fn standard() -> Self {
        Self {
            entries: STANDARD_SHUTTER_SPEEDS.to_vec(),
        }
    }

    pub fn entries(&self) -> &[f64] {
        &self.entries
    }

    /// Nearest nominal speed to `duration_seconds`.
    ///
    /// # Errors
    /// `MeasurementError::InvalidDuration` for zero, negative or non-finite
    /// input. Every other duration maps to some entry.
    pub fn classify(&self, duration_seconds: f64) -> Result<NominalSpeed, MeasurementError> {
        if !(duration_seconds.is_finite() && duration_seconds > 0.0) {
            return Err(MeasurementError::InvalidDuration {
                seconds: duration_seconds,
            });
        }

        let mut best = self.entries[0];
        let mut best_distance = (best - duration_seconds).abs();
        for &entry in &self.entries[1..] {
            let distance = (entry - duration_seconds).abs();
            // Strict: equal distance keeps the earlier entry
            if distance < best_distance {
                best = entry;
                best_distance = distance;
            }
        }

        Ok(NominalSpeed::new(best))
    }
}

impl Default for SpeedTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Render a duration in photographic notation.
///
/// Whole seconds for one second and longer, reciprocal fractions below.
pub fn format_speed(seconds: f64) -> String {
    if seconds >= 1.0 {
        format!("{}s", seconds.round() as u64)
    } else {
        format!("1/{}", (1.0 / seconds).round() as u64)
    }
}

/// A table entry and its label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NominalSpeed {
    pub seconds: f64,
    pub label: String,
}

impl NominalSpeed {
    pub fn new(seconds: f64) -> Self {
        Self {
            seconds,
            label: format_speed(seconds),
        }
    }
}

/// One classified measurement, as reported in continuous mode
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShutterReading {
    pub duration_seconds: f64,
    pub nominal: NominalSpeed,
    /// `log2(measured / nominal)`: positive means the shutter stayed open
    /// too long (overexposure)
    pub deviation_stops: f64,
}

impl ShutterReading {
    pub fn from_measurement(
        measurement: &Measurement,
        table: &SpeedTable,
    ) -> Result<Self, MeasurementError> {
        let duration_seconds = measurement.duration_seconds();
        let nominal = table.classify(duration_seconds)?;
        let deviation_stops = (duration_seconds / nominal.seconds).log2();
        Ok(Self {
            duration_seconds,
            nominal,
            deviation_stops,
        })
    }
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
