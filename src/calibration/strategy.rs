// Threshold placement between the closed and open references

use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;
use crate::timing::Polarity;

/// Where to put the threshold between the two references
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdStrategy {
    /// Halfway between the references; symmetric detection
    #[default]
    Midpoint,
    /// `fraction` of the way from the closed reference towards the open one.
    ///
    /// Small fractions trigger early on slow opening ramps, at the cost of
    /// reporting edges slightly before the true transition.
    BiasedTowardClosed { fraction: f64 },
}

impl ThresholdStrategy {
    /// Check that the strategy keeps the threshold strictly between references
    pub fn validate(&self) -> Result<(), CalibrationError> {
        match *self {
            ThresholdStrategy::Midpoint => Ok(()),
            ThresholdStrategy::BiasedTowardClosed { fraction } => {
                if fraction > 0.0 && fraction < 1.0 {
                    Ok(())
                } else {
                    Err(CalibrationError::InvalidParameter {
                        reason: format!("bias fraction {} outside (0, 1)", fraction),
                    })
                }
            }
        }
    }

    /// Compute the threshold for the given references
    pub fn threshold(&self, closed_reference: f64, open_reference: f64) -> f64 {
        match *self {
            ThresholdStrategy::Midpoint => (closed_reference + open_reference) / 2.0,
            ThresholdStrategy::BiasedTowardClosed { fraction } => {
                closed_reference - (closed_reference - open_reference) * fraction
            }
        }
    }
}

/// Reference levels and the derived decision threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub closed_reference: f64,
    pub open_reference: f64,
    pub threshold: f64,
}

impl CalibrationResult {
    /// Derive the threshold from averaged references
    ///
    /// # Errors
    /// - `InvalidParameter` if the strategy is out of range, or places the
    ///   threshold on a reference once rounded
    /// - `NoDiscriminableSignal` if the references are equal
    pub fn from_references(
        closed_reference: f64,
        open_reference: f64,
        strategy: ThresholdStrategy,
    ) -> Result<Self, CalibrationError> {
        strategy.validate()?;

        if closed_reference == open_reference {
            return Err(CalibrationError::NoDiscriminableSignal {
                reference: closed_reference,
            });
        }

        let threshold = strategy.threshold(closed_reference, open_reference);
        let (low, high) = if closed_reference < open_reference {
            (closed_reference, open_reference)
        } else {
            (open_reference, closed_reference)
        };
        if !(threshold > low && threshold < high) {
            return Err(CalibrationError::InvalidParameter {
                reason: format!(
                    "{:?} puts the threshold at {} which is not strictly between {} and {}",
                    strategy, threshold, open_reference, closed_reference
                ),
            });
        }

        Ok(Self {
            closed_reference,
            open_reference,
            threshold,
        })
    }

    /// Absolute distance between the references
    pub fn contrast(&self) -> f64 {
        (self.closed_reference - self.open_reference).abs()
    }

    /// Sensor orientation implied by the references
    pub fn polarity(&self) -> Polarity {
        Polarity::from_references(self.closed_reference, self.open_reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint_threshold() {
        let result =
            CalibrationResult::from_references(30_000.0, 2_000.0, ThresholdStrategy::Midpoint)
                .unwrap();
        assert_eq!(result.threshold, 16_000.0);
        assert_eq!(result.contrast(), 28_000.0);
        assert_eq!(result.polarity(), Polarity::DarkHigh);
    }

    #[test]
    fn test_biased_threshold() {
        let result = CalibrationResult::from_references(
            30_000.0,
            2_000.0,
            ThresholdStrategy::BiasedTowardClosed { fraction: 0.1 },
        )
        .unwrap();
        assert!((result.threshold - 27_200.0).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_strictly_between_for_either_orientation() {
        let strategies = [
            ThresholdStrategy::Midpoint,
            ThresholdStrategy::BiasedTowardClosed { fraction: 0.1 },
            ThresholdStrategy::BiasedTowardClosed { fraction: 0.9 },
        ];
        for strategy in strategies {
            let high = CalibrationResult::from_references(30_000.0, 2_000.0, strategy).unwrap();
            assert!(high.threshold < 30_000.0 && high.threshold > 2_000.0);

            let low = CalibrationResult::from_references(150.0, 3_100.0, strategy).unwrap();
            assert!(low.threshold > 150.0 && low.threshold < 3_100.0);
            assert_eq!(low.polarity(), Polarity::DarkLow);
        }
    }

    #[test]
    fn test_equal_references_rejected() {
        for value in [0.0, 1.0, -5.0, 16_000.0, 32_767.0] {
            match CalibrationResult::from_references(value, value, ThresholdStrategy::Midpoint) {
                Err(CalibrationError::NoDiscriminableSignal { reference }) => {
                    assert_eq!(reference, value)
                }
                other => panic!("Expected NoDiscriminableSignal, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_unequal_references_never_degenerate() {
        for (closed, open) in [(1.0, 0.0), (0.0, 1.0), (30_000.0, 29_999.0), (-3.0, 3.0)] {
            assert!(
                CalibrationResult::from_references(closed, open, ThresholdStrategy::Midpoint)
                    .is_ok()
            );
        }
    }

    #[test]
    fn test_fraction_out_of_range() {
        for fraction in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let strategy = ThresholdStrategy::BiasedTowardClosed { fraction };
            assert!(matches!(
                CalibrationResult::from_references(30_000.0, 2_000.0, strategy),
                Err(CalibrationError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn test_tiny_fraction_rounding_onto_reference_rejected() {
        let strategy = ThresholdStrategy::BiasedTowardClosed { fraction: 1e-17 };
        assert!(strategy.validate().is_ok());
        assert_eq!(strategy.threshold(30_000.0, 2_000.0), 30_000.0);

        match CalibrationResult::from_references(30_000.0, 2_000.0, strategy) {
            Err(CalibrationError::InvalidParameter { reason }) => {
                assert!(reason.contains("strictly between"), "{}", reason)
            }
            other => panic!("Expected InvalidParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_strategy_serde_shape() {
        let json = serde_json::to_string(&ThresholdStrategy::BiasedTowardClosed {
            fraction: 0.1,
        })
        .unwrap();
        assert_eq!(json, r#"{"kind":"biased_toward_closed","fraction":0.1}"#);

        let parsed: ThresholdStrategy = serde_json::from_str(r#"{"kind":"midpoint"}"#).unwrap();
        assert_eq!(parsed, ThresholdStrategy::Midpoint);
    }
}
