// Timing module - edge detection and open-duration measurement
//
// `edge` holds the pure state machine; `ShutterTimer` drives it from a live
// channel, stamping each sample with exactly one clock read.

pub mod edge;

use std::time::Duration;

use tracing::debug;

use crate::calibration::CalibrationResult;
use crate::clock::TimeSource;
use crate::config::TimingConfig;
use crate::error::{log_measurement_error, MeasurementError};
use crate::sensor::SensorChannel;
use crate::signal::StopSignal;

pub use edge::{max_hysteresis, EdgeTimer, LevelDiscriminator, Measurement, Polarity, TimerState};

/// Measures successive shutter openings against a fixed calibration
pub struct ShutterTimer {
    edges: EdgeTimer,
    poll_interval: Duration,
}

impl ShutterTimer {
    pub fn new(calibration: &CalibrationResult, config: &TimingConfig) -> Self {
        let levels =
            LevelDiscriminator::from_calibration(calibration, config.hysteresis, config.polarity);
        Self {
            edges: EdgeTimer::new(levels),
            poll_interval: Duration::from_micros(config.poll_interval_us),
        }
    }

    pub fn state(&self) -> TimerState {
        self.edges.state()
    }

    pub fn levels(&self) -> &LevelDiscriminator {
        self.edges.levels()
    }

    /// Block until the next open -> close cycle completes.
    ///
    /// The first call synchronises on a closed sample before timing anything.
    /// Later calls continue from `AwaitOpen`, so back-to-back firings are each
    /// measured once. A sensor error abandons the partial cycle and the next
    /// call resynchronises.
    pub fn next_measurement(
        &mut self,
        channel: &mut dyn SensorChannel,
        clock: &dyn TimeSource,
        interrupt: &StopSignal,
    ) -> Result<Measurement, MeasurementError> {
        loop {
            if interrupt.is_asserted() {
                return Err(MeasurementError::Interrupted);
            }

            let sample = match channel.sample() {
                Ok(sample) => sample,
                Err(err) => {
                    self.edges.reset();
                    let err = MeasurementError::from(err);
                    log_measurement_error(&err, "next_measurement");
                    return Err(err);
                }
            };
            let at = clock.now();

            if let Some(measurement) = self.edges.observe(sample, at) {
                debug!(
                    "[ShutterTimer] open for {:.6}s",
                    measurement.duration_seconds()
                );
                return Ok(measurement);
            }

            if !self.poll_interval.is_zero() {
                std::thread::sleep(self.poll_interval);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SteppedTimeSource;
    use crate::error::SensorError;
    use crate::testing::ScriptedChannel;

    fn calibration() -> CalibrationResult {
        CalibrationResult {
            closed_reference: 30_000.0,
            open_reference: 2_000.0,
            threshold: 16_000.0,
        }
    }

    #[test]
    fn test_measures_from_sample_timestamps() {
        let mut channel = ScriptedChannel::new(vec![
            30_000.0, 2_000.0, 2_000.0, 2_000.0, 2_000.0, 30_000.0,
        ]);
        let clock = SteppedTimeSource::new(Duration::from_millis(2));
        let mut timer = ShutterTimer::new(&calibration(), &TimingConfig::default());

        let m = timer
            .next_measurement(&mut channel, &clock, &StopSignal::new())
            .unwrap();

        // Open edge at tick 1, close edge at tick 5
        assert_eq!(m.duration, Duration::from_millis(8));
        assert_eq!(clock.ticks(), 6);
    }

    #[test]
    fn test_interrupt_checked_before_read() {
        let mut channel = ScriptedChannel::new(vec![30_000.0]);
        let clock = SteppedTimeSource::new(Duration::from_millis(1));
        let mut timer = ShutterTimer::new(&calibration(), &TimingConfig::default());
        let interrupt = StopSignal::new();
        interrupt.assert();

        let result = timer.next_measurement(&mut channel, &clock, &interrupt);
        assert_eq!(result, Err(MeasurementError::Interrupted));
        assert_eq!(channel.reads(), 0);
    }

    #[test]
    fn test_oversized_hysteresis_still_measures() {
        let mut samples = vec![30_000.0; 2];
        for _ in 0..3 {
            samples.extend([2_000.0; 4]);
            samples.extend([30_000.0; 2]);
        }
        let mut channel = ScriptedChannel::new(samples);
        let clock = SteppedTimeSource::new(Duration::from_millis(1));
        let config = TimingConfig {
            hysteresis: 20_000.0,
            ..TimingConfig::default()
        };
        let mut timer = ShutterTimer::new(&calibration(), &config);
        let interrupt = StopSignal::new();

        assert_eq!(timer.levels().hysteresis(), 7_000.0);
        for _ in 0..3 {
            let m = timer
                .next_measurement(&mut channel, &clock, &interrupt)
                .unwrap();
            assert_eq!(m.duration, Duration::from_millis(4));
        }
    }

    #[test]
    fn test_sensor_error_resets_cycle() {
        // Script runs out while the shutter is open
        let mut channel = ScriptedChannel::new(vec![30_000.0, 2_000.0]);
        let clock = SteppedTimeSource::new(Duration::from_millis(1));
        let mut timer = ShutterTimer::new(&calibration(), &TimingConfig::default());

        let result = timer.next_measurement(&mut channel, &clock, &StopSignal::new());
        assert!(matches!(
            result,
            Err(MeasurementError::Sensor(SensorError::ReadFailed { .. }))
        ));
        assert_eq!(timer.state(), TimerState::AwaitClose);
    }
}
