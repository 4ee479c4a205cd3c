//! Raw trace capture.
//!
//! Records every `(elapsed, sample)` pair from the moment capture starts
//! until a stop signal is asserted by another thread. No threshold logic runs
//! during capture; the waveform is handed back whole for inspection, and
//! [`TraceRecord::open_duration`] can time it afterwards.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::TimeSource;
use crate::error::{log_measurement_error, InteractionError, MeasurementError};
use crate::prompt::{ConfirmationSource, Prompt};
use crate::sensor::SensorChannel;
use crate::signal::StopSignal;
use crate::timing::{EdgeTimer, LevelDiscriminator};

/// One captured sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TracePoint {
    /// Seconds since capture started, from the monotonic clock
    pub elapsed_seconds: f64,
    pub sample: f64,
}

/// Completed capture, in arrival order. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TraceRecord {
    points: Vec<TracePoint>,
}

/// Aggregate figures for a capture
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TraceSummary {
    pub sample_count: usize,
    pub total_seconds: f64,
    pub mean_interval_seconds: f64,
    pub effective_rate_hz: f64,
}

impl TraceRecord {
    /// Wrap captured points; an empty capture is an error, not a record.
    pub fn from_points(points: Vec<TracePoint>) -> Result<Self, MeasurementError> {
        if points.is_empty() {
            return Err(MeasurementError::EmptyCapture);
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[TracePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Elapsed time of the last sample
    pub fn total_duration(&self) -> f64 {
        self.points
            .last()
            .map(|point| point.elapsed_seconds)
            .unwrap_or(0.0)
    }

    pub fn summary(&self) -> TraceSummary {
        let sample_count = self.points.len();
        let total_seconds = self.total_duration();
        let intervals = sample_count.saturating_sub(1);

        let (mean_interval_seconds, effective_rate_hz) = if intervals > 0 && total_seconds > 0.0 {
            let first = self.points[0].elapsed_seconds;
            let span = total_seconds - first;
            (span / intervals as f64, intervals as f64 / span.max(f64::EPSILON))
        } else {
            (0.0, 0.0)
        };

        TraceSummary {
            sample_count,
            total_seconds,
            mean_interval_seconds,
            effective_rate_hz,
        }
    }

    /// First open -> close interval in the waveform, in seconds.
    ///
    /// Runs the same edge timer used for live measurement over the recorded
    /// timestamps. `None` when the capture holds no complete cycle.
    pub fn open_duration(&self, levels: &LevelDiscriminator) -> Option<f64> {
        let mut timer = EdgeTimer::new(*levels);
        let origin = Instant::now();
        self.points.iter().find_map(|point| {
            let at = origin + Duration::from_secs_f64(point.elapsed_seconds.max(0.0));
            timer
                .observe(point.sample, at)
                .map(|measurement| measurement.duration_seconds())
        })
    }
}

/// Captures a trace until stopped.
#[derive(Debug, Clone)]
pub struct TraceRecorder {
    initial_capacity: usize,
}

impl TraceRecorder {
    pub fn new(initial_capacity: usize) -> Self {
        Self { initial_capacity }
    }

    /// Sample `channel` until `stop` is asserted.
    ///
    /// `stop` is checked once per iteration before each read, so the loop
    /// ends within one read latency of the assertion. `interrupt` aborts the
    /// capture instead; the partial trace is dropped and `Interrupted` is
    /// returned.
    ///
    /// # Errors
    /// * `EmptyCapture` - `stop` was asserted before the first sample
    /// * `Sensor` - a read failed; the partial trace is dropped
    /// * `Interrupted` - the session interrupt was asserted
    pub fn record(
        &self,
        channel: &mut dyn SensorChannel,
        clock: &dyn TimeSource,
        stop: &StopSignal,
        interrupt: &StopSignal,
    ) -> Result<TraceRecord, MeasurementError> {
        let mut points = Vec::with_capacity(self.initial_capacity);
        let start = clock.now();

        while !stop.is_asserted() {
            if interrupt.is_asserted() {
                debug!("[TraceRecorder] interrupted after {} samples", points.len());
                return Err(MeasurementError::Interrupted);
            }
            let sample = channel.sample().map_err(|err| {
                let err = MeasurementError::from(err);
                log_measurement_error(&err, "TraceRecorder::record");
                err
            })?;
            let elapsed = clock.now().saturating_duration_since(start);
            points.push(TracePoint {
                elapsed_seconds: elapsed.as_secs_f64(),
                sample,
            });
        }

        let record = TraceRecord::from_points(points)?;
        info!(
            "[TraceRecorder] captured {} samples over {:.3}s",
            record.len(),
            record.total_duration()
        );
        Ok(record)
    }
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new(4096)
    }
}

/// Wait for the operator's stop confirmation on a separate thread.
///
/// Asserts `stop` once the operator confirms, or when input closes (nothing
/// else could end the capture). Asserting `release` abandons the wait without
/// touching `stop`; the session does this when capture ends for another
/// reason so the thread can be joined.
pub fn spawn_stop_listener(
    prompts: Arc<dyn ConfirmationSource>,
    stop: StopSignal,
    release: StopSignal,
) -> JoinHandle<Result<(), InteractionError>> {
    thread::spawn(move || {
        let outcome = prompts.confirm(Prompt::StopRecording, &release);
        match outcome {
            Ok(()) => {
                stop.assert();
            }
            Err(InteractionError::InputClosed) => {
                warn!("[TraceRecorder] operator input closed; stopping capture");
                stop.assert();
            }
            Err(InteractionError::Interrupted) => {}
        }
        outcome
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{SteppedTimeSource, SystemTimeSource};
    use crate::prompt::AutoConfirm;
    use crate::testing::ScriptedChannel;
    use crate::timing::Polarity;

    fn points(samples: &[f64], step: f64) -> Vec<TracePoint> {
        samples
            .iter()
            .enumerate()
            .map(|(i, &sample)| TracePoint {
                elapsed_seconds: i as f64 * step,
                sample,
            })
            .collect()
    }

    #[test]
    fn test_stop_before_start_is_empty_capture() {
        let mut channel = ScriptedChannel::new(vec![1.0, 2.0, 3.0]);
        let clock = SteppedTimeSource::new(Duration::from_millis(1));
        let stop = StopSignal::new();
        stop.assert();

        let result = TraceRecorder::default().record(&mut channel, &clock, &stop, &StopSignal::new());

        assert_eq!(result, Err(MeasurementError::EmptyCapture));
        assert_eq!(channel.reads(), 0);
    }

    #[test]
    fn test_points_are_ordered_and_timestamped() {
        let clock = SteppedTimeSource::new(Duration::from_millis(2));
        let stop = StopSignal::new();
        let recorder = TraceRecorder::new(8);

        // Stop from inside the loop once three samples are in
        let mut channel = StopAfter {
            inner: ScriptedChannel::new(vec![10.0, 20.0, 30.0, 40.0]),
            remaining: 3,
            stop: stop.clone(),
        };
        let record = recorder
            .record(&mut channel, &clock, &stop, &StopSignal::new())
            .unwrap();

        let samples: Vec<f64> = record.points().iter().map(|p| p.sample).collect();
        assert_eq!(samples, vec![10.0, 20.0, 30.0]);
        let elapsed: Vec<f64> = record.points().iter().map(|p| p.elapsed_seconds).collect();
        assert_eq!(elapsed, vec![0.002, 0.004, 0.006]);
    }

    /// Asserts `stop` after handing out `remaining` samples
    struct StopAfter {
        inner: ScriptedChannel,
        remaining: usize,
        stop: StopSignal,
    }

    impl SensorChannel for StopAfter {
        fn sample(&mut self) -> Result<f64, crate::error::SensorError> {
            let sample = self.inner.sample()?;
            self.remaining -= 1;
            if self.remaining == 0 {
                self.stop.assert();
            }
            Ok(sample)
        }

        fn describe(&self) -> String {
            "stop-after".to_string()
        }
    }

    #[test]
    fn test_concurrent_stop_ends_capture() {
        let mut channel = ScriptedChannel::new(vec![100.0, 200.0])
            .cycle()
            .with_latency(Duration::from_millis(1));
        let clock = SystemTimeSource::default();
        let stop = StopSignal::new();

        let stopper = stop.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            let stopped_at = Instant::now();
            stopper.assert();
            stopped_at
        });

        let started = Instant::now();
        let record = TraceRecorder::default()
            .record(&mut channel, &clock, &stop, &StopSignal::new())
            .unwrap();
        let returned_at = Instant::now();
        let stopped_at = handle.join().unwrap();

        // A handful of 1ms reads, with room for scheduler jitter
        let slack = Duration::from_millis(25);
        assert!(
            returned_at.saturating_duration_since(stopped_at) < slack,
            "returned {:?} after stop",
            returned_at.saturating_duration_since(stopped_at)
        );

        assert!(!record.is_empty());
        let elapsed: Vec<f64> = record.points().iter().map(|p| p.elapsed_seconds).collect();
        assert!(elapsed.windows(2).all(|w| w[0] <= w[1]));

        // Capture started after `started`, so no sample can be later than this
        let stop_offset = stopped_at.duration_since(started) + slack;
        let last = elapsed.last().copied().unwrap_or_default();
        assert!(last <= stop_offset.as_secs_f64(), "last sample at {}s", last);
    }

    #[test]
    fn test_interrupt_discards_partial_trace() {
        let mut channel = ScriptedChannel::new(vec![1.0]).cycle();
        let clock = SteppedTimeSource::new(Duration::from_millis(1));
        let interrupt = StopSignal::new();
        interrupt.assert();

        let result =
            TraceRecorder::default().record(&mut channel, &clock, &StopSignal::new(), &interrupt);
        assert_eq!(result, Err(MeasurementError::Interrupted));
    }

    #[test]
    fn test_read_failure_is_fatal_to_capture() {
        let mut channel = ScriptedChannel::new(vec![1.0, 2.0]);
        let clock = SteppedTimeSource::new(Duration::from_millis(1));

        let result = TraceRecorder::default().record(
            &mut channel,
            &clock,
            &StopSignal::new(),
            &StopSignal::new(),
        );
        assert!(matches!(result, Err(MeasurementError::Sensor(_))));
    }

    #[test]
    fn test_summary() {
        let record = TraceRecord::from_points(points(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.001)).unwrap();
        let summary = record.summary();

        assert_eq!(summary.sample_count, 5);
        assert!((summary.total_seconds - 0.004).abs() < 1e-12);
        assert!((summary.mean_interval_seconds - 0.001).abs() < 1e-12);
        assert!((summary.effective_rate_hz - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_point_summary() {
        let record = TraceRecord::from_points(points(&[7.0], 0.001)).unwrap();
        let summary = record.summary();
        assert_eq!(summary.sample_count, 1);
        assert_eq!(summary.effective_rate_hz, 0.0);
    }

    #[test]
    fn test_open_duration_from_waveform() {
        let samples = [30_000.0, 30_000.0, 2_000.0, 2_000.0, 2_000.0, 30_000.0];
        let record = TraceRecord::from_points(points(&samples, 0.001)).unwrap();
        let levels = LevelDiscriminator::new(16_000.0, 0.0, Polarity::DarkHigh);

        let open = record.open_duration(&levels).unwrap();
        assert!((open - 0.003).abs() < 1e-6);
    }

    #[test]
    fn test_open_duration_without_cycle() {
        let record = TraceRecord::from_points(points(&[30_000.0, 2_000.0], 0.001)).unwrap();
        let levels = LevelDiscriminator::new(16_000.0, 0.0, Polarity::DarkHigh);
        assert_eq!(record.open_duration(&levels), None);
    }

    #[test]
    fn test_stop_listener_asserts_stop_on_confirm() {
        let stop = StopSignal::new();
        let handle = spawn_stop_listener(Arc::new(AutoConfirm::new()), stop.clone(), StopSignal::new());

        assert_eq!(handle.join().unwrap(), Ok(()));
        assert!(stop.is_asserted());
    }

    #[test]
    fn test_released_listener_leaves_stop_alone() {
        let stop = StopSignal::new();
        let release = StopSignal::new();
        release.assert();
        let handle = spawn_stop_listener(Arc::new(AutoConfirm::new()), stop.clone(), release);

        assert_eq!(handle.join().unwrap(), Err(InteractionError::Interrupted));
        assert!(!stop.is_asserted());
    }
}
