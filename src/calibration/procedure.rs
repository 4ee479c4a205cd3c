// Calibration procedure - collect reference batches and derive the threshold

use tracing::{info, warn};

use super::strategy::{CalibrationResult, ThresholdStrategy};
use crate::error::{log_calibration_error, CalibrationError};
use crate::prompt::{ConfirmationSource, Prompt};
use crate::sensor::SensorChannel;
use crate::signal::StopSignal;

/// Run the two-step calibration against a live channel
///
/// # Arguments
/// * `channel` - Sensor to sample
/// * `prompts` - Operator confirmation before each batch
/// * `interrupt` - Session interrupt; checked before every read
/// * `sample_count` - Samples averaged per reference (typically 10)
/// * `strategy` - Threshold placement
///
/// # Returns
/// * `Ok(CalibrationResult)` - References and threshold
/// * `Err(CalibrationError)` - Invalid parameters, read failure, interrupt,
///   or no discriminable signal
pub fn calibrate(
    channel: &mut dyn SensorChannel,
    prompts: &dyn ConfirmationSource,
    interrupt: &StopSignal,
    sample_count: usize,
    strategy: ThresholdStrategy,
) -> Result<CalibrationResult, CalibrationError> {
    if sample_count == 0 {
        return Err(CalibrationError::InvalidParameter {
            reason: "sample count must be at least 1".to_string(),
        });
    }
    strategy.validate()?;

    prompts.confirm(Prompt::HoldShutterClosed, interrupt)?;
    let closed_reference = average_reference(channel, sample_count, interrupt)?;

    prompts.confirm(Prompt::HoldShutterOpen, interrupt)?;
    let open_reference = average_reference(channel, sample_count, interrupt)?;

    let result = CalibrationResult::from_references(closed_reference, open_reference, strategy)
        .inspect_err(|err| log_calibration_error(err, "calibrate"))?;

    info!(
        "[Calibration] closed={:.0} open={:.0} threshold={:.0} ({:?})",
        result.closed_reference, result.open_reference, result.threshold, strategy
    );
    if result.contrast() < 100.0 {
        warn!(
            "[Calibration] Low contrast ({:.1}); edges may be missed or doubled",
            result.contrast()
        );
    }

    Ok(result)
}

fn average_reference(
    channel: &mut dyn SensorChannel,
    sample_count: usize,
    interrupt: &StopSignal,
) -> Result<f64, CalibrationError> {
    let mut sum = 0.0;
    for _ in 0..sample_count {
        if interrupt.is_asserted() {
            return Err(CalibrationError::Interrupted);
        }
        sum += channel.sample()?;
    }
    Ok(sum / sample_count as f64)
}

#[cfg(test)]
#[path = "procedure_tests.rs"]
mod tests;
