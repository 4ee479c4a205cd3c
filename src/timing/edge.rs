//! Edge-triggered shutter timing state machine.
//!
//! States advance `AwaitClose -> AwaitOpen -> AwaitCloseAgain`. The first
//! closed sample synchronises the machine; after that every open -> closed
//! cycle yields one [`Measurement`] and the machine returns to `AwaitOpen`.
//! Durations come from the instants passed in, never from sample counts.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::calibration::CalibrationResult;

/// Which side of the threshold a closed (dark) shutter reads on.
///
/// With the photoresistor divider feeding the ADS1115, darkness pulls the
/// input up, so the deployed orientation is `DarkHigh`: closed means
/// `sample >= threshold`, open means `sample < threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    #[default]
    DarkHigh,
    /// Closed means `sample <= threshold`, open means `sample > threshold`
    DarkLow,
}

impl Polarity {
    /// Orientation implied by a pair of reference levels
    pub fn from_references(closed_reference: f64, open_reference: f64) -> Self {
        if closed_reference >= open_reference {
            Polarity::DarkHigh
        } else {
            Polarity::DarkLow
        }
    }
}

/// Decides whether a sample reads as closed or open.
///
/// With zero hysteresis every sample is exactly one of the two. With a
/// positive band, samples inside `threshold ± hysteresis` are neither, so a
/// signal bouncing around the threshold cannot produce extra edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelDiscriminator {
    threshold: f64,
    hysteresis: f64,
    polarity: Polarity,
}

impl LevelDiscriminator {
    pub fn new(threshold: f64, hysteresis: f64, polarity: Polarity) -> Self {
        Self {
            threshold,
            hysteresis: hysteresis.max(0.0),
            polarity,
        }
    }

    /// Build from a calibration, clamping the band so both states stay
    /// reachable.
    ///
    /// The band is limited to half the smaller gap between the threshold and
    /// either reference; a wider band would leave the references themselves
    /// inside it and the timer could never leave `AwaitClose`.
    pub fn from_calibration(
        calibration: &CalibrationResult,
        hysteresis: f64,
        polarity: Polarity,
    ) -> Self {
        let limit = max_hysteresis(calibration);
        let hysteresis = if hysteresis > limit {
            warn!(
                "[Timing] hysteresis {} does not fit between references {} and {}; using {}",
                hysteresis, calibration.open_reference, calibration.closed_reference, limit
            );
            limit
        } else {
            hysteresis
        };
        Self::new(calibration.threshold, hysteresis, polarity)
    }

    pub fn hysteresis(&self) -> f64 {
        self.hysteresis
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn is_closed(&self, sample: f64) -> bool {
        match self.polarity {
            Polarity::DarkHigh => sample >= self.threshold + self.hysteresis,
            Polarity::DarkLow => sample <= self.threshold - self.hysteresis,
        }
    }

    pub fn is_open(&self, sample: f64) -> bool {
        match self.polarity {
            Polarity::DarkHigh => sample < self.threshold - self.hysteresis,
            Polarity::DarkLow => sample > self.threshold + self.hysteresis,
        }
    }
}

/// Widest band around the threshold that keeps both references outside it
pub fn max_hysteresis(calibration: &CalibrationResult) -> f64 {
    let to_closed = (calibration.closed_reference - calibration.threshold).abs();
    let to_open = (calibration.threshold - calibration.open_reference).abs();
    to_closed.min(to_open) / 2.0
}

/// Time between the open edge and the following close edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub duration: Duration,
}

impl Measurement {
    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// Timer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Waiting for a closed sample to synchronise on
    AwaitClose,
    /// Synchronised; waiting for the shutter to open
    AwaitOpen,
    /// Open edge seen at `opened_at`; waiting for the close edge
    AwaitCloseAgain { opened_at: Instant },
}

/// Pure state machine fed one `(sample, instant)` observation at a time
#[derive(Debug, Clone)]
pub struct EdgeTimer {
    levels: LevelDiscriminator,
    state: TimerState,
}

impl EdgeTimer {
    pub fn new(levels: LevelDiscriminator) -> Self {
        Self {
            levels,
            state: TimerState::AwaitClose,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn levels(&self) -> &LevelDiscriminator {
        &self.levels
    }

    /// Drop any partial cycle and resynchronise on the next closed sample
    pub fn reset(&mut self) {
        self.state = TimerState::AwaitClose;
    }

    /// Feed one observation. Returns a measurement when it completes a cycle.
    pub fn observe(&mut self, sample: f64, at: Instant) -> Option<Measurement> {
        match self.state {
            TimerState::AwaitClose => {
                if self.levels.is_closed(sample) {
                    self.state = TimerState::AwaitOpen;
                }
                None
            }
            TimerState::AwaitOpen => {
                if self.levels.is_open(sample) {
                    self.state = TimerState::AwaitCloseAgain { opened_at: at };
                }
                None
            }
            TimerState::AwaitCloseAgain { opened_at } => {
                if self.levels.is_closed(sample) {
                    self.state = TimerState::AwaitOpen;
                    Some(Measurement {
                        duration: at.saturating_duration_since(opened_at),
                    })
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "edge_tests.rs"]
mod tests;
