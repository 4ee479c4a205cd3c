// Session - one sensor, one operator, one interrupt
//
// Wires the sensor channel, confirmation source, clock and configuration
// together and runs the three operator-facing modes on top of a calibration:
// continuous measurement, raw trace capture and live monitoring.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::calibration::{calibrate, CalibrationResult};
use crate::classifier::{NominalSpeed, ShutterReading, SpeedTable};
use crate::clock::{SystemTimeSource, TimeSource};
use crate::config::{AppConfig, SensorBackend};
use crate::error::{CalibrationError, InteractionError, MeasurementError, SensorError};
use crate::monitor::{LiveMonitor, MonitorReading, MonitorStats};
use crate::prompt::{ConfirmationSource, Prompt, StdinPrompt};
use crate::sensor::{open_hardware, SensorChannel, SimulatedShutter};
use crate::signal::StopSignal;
use crate::testing::SimulatedOperator;
use crate::timing::{LevelDiscriminator, ShutterTimer};
use crate::trace::{spawn_stop_listener, TraceRecord, TraceRecorder, TraceSummary};

/// Everything a trace capture reports back
#[derive(Debug, Clone, Serialize)]
pub struct ProfileReport {
    pub calibration: CalibrationResult,
    pub summary: TraceSummary,
    /// First open -> close interval found in the trace
    pub open_duration_seconds: Option<f64>,
    pub nominal: Option<NominalSpeed>,
    pub trace: TraceRecord,
}

pub struct Session {
    channel: Box<dyn SensorChannel>,
    prompts: Arc<dyn ConfirmationSource>,
    clock: Arc<dyn TimeSource>,
    config: AppConfig,
    speeds: SpeedTable,
    interrupt: StopSignal,
}

impl Session {
    /// Open the configured backend.
    ///
    /// The ADS1115 backend pairs with stdin confirmations. The simulated
    /// backend pairs with a simulated operator that moves the model shutter
    /// and ends trace captures after one and a half firing periods.
    pub fn connect(config: AppConfig, interrupt: StopSignal) -> Result<Self, SensorError> {
        let (channel, prompts): (Box<dyn SensorChannel>, Arc<dyn ConfirmationSource>) =
            match config.sensor.backend {
                SensorBackend::Ads1115 => (
                    open_hardware(&config.sensor)?,
                    Arc::new(StdinPrompt::spawn()),
                ),
                SensorBackend::Simulated => {
                    let shutter = SimulatedShutter::new(&config.sensor.simulated);
                    let record_for =
                        Duration::from_millis(config.sensor.simulated.period_ms) * 3 / 2;
                    let operator = SimulatedOperator::new(shutter.control(), record_for);
                    (Box::new(shutter), Arc::new(operator))
                }
            };

        info!("[Session] Sensor: {}", channel.describe());
        Ok(Self::new(channel, prompts, config, interrupt))
    }

    pub fn new(
        channel: Box<dyn SensorChannel>,
        prompts: Arc<dyn ConfirmationSource>,
        config: AppConfig,
        interrupt: StopSignal,
    ) -> Self {
        let speeds = SpeedTable::new(config.shutter_speeds.clone()).unwrap_or_else(|err| {
            warn!("[Session] {}; using standard shutter speeds", err);
            SpeedTable::standard()
        });
        Self {
            channel,
            prompts,
            clock: Arc::new(SystemTimeSource::default()),
            config,
            speeds,
            interrupt,
        }
    }

    /// Replace the wall clock, e.g. with a stepped clock in tests
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn speeds(&self) -> &SpeedTable {
        &self.speeds
    }

    pub fn interrupt(&self) -> &StopSignal {
        &self.interrupt
    }

    pub fn calibrate(&mut self) -> Result<CalibrationResult, CalibrationError> {
        let result = calibrate(
            self.channel.as_mut(),
            self.prompts.as_ref(),
            &self.interrupt,
            self.config.calibration.samples_per_reference,
            self.config.calibration.strategy,
        )?;

        if result.polarity() != self.config.timing.polarity {
            warn!(
                "[Session] References suggest {:?} but timing is configured for {:?}",
                result.polarity(),
                self.config.timing.polarity
            );
        }
        Ok(result)
    }

    /// Measure and classify shutter firings, sending each reading to `tx`.
    ///
    /// Runs until `limit` readings were sent, the receiver is dropped, or the
    /// interrupt is asserted. An interrupt is a normal end here; the count of
    /// readings sent is returned either way.
    pub fn measure(
        &mut self,
        calibration: &CalibrationResult,
        limit: Option<usize>,
        tx: &UnboundedSender<ShutterReading>,
    ) -> Result<usize, MeasurementError> {
        match self.prompts.confirm(Prompt::ReadyToMeasure, &self.interrupt) {
            Ok(()) => {}
            Err(InteractionError::Interrupted) => return Ok(0),
            Err(err) => return Err(err.into()),
        }

        let mut timer = ShutterTimer::new(calibration, &self.config.timing);
        let mut sent = 0;
        while limit.map_or(true, |limit| sent < limit) {
            let next = timer.next_measurement(
                self.channel.as_mut(),
                self.clock.as_ref(),
                &self.interrupt,
            );
            let measurement = match next {
                Ok(measurement) => measurement,
                Err(MeasurementError::Interrupted) => break,
                Err(err) => return Err(err),
            };

            let reading = ShutterReading::from_measurement(&measurement, &self.speeds)?;
            info!(
                "[Session] {:.6}s ~ {} ({:+.2} EV)",
                reading.duration_seconds, reading.nominal.label, reading.deviation_stops
            );
            if tx.send(reading).is_err() {
                break;
            }
            sent += 1;
        }
        Ok(sent)
    }

    /// Capture one raw trace between the start and stop confirmations.
    pub fn record_profile(
        &mut self,
        calibration: &CalibrationResult,
    ) -> Result<ProfileReport, MeasurementError> {
        self.prompts.confirm(Prompt::StartRecording, &self.interrupt)?;

        let stop = StopSignal::new();
        let release = StopSignal::new();
        let listener = spawn_stop_listener(self.prompts.clone(), stop.clone(), release.clone());

        let recorder = TraceRecorder::new(self.config.trace.initial_capacity);
        let captured = recorder.record(
            self.channel.as_mut(),
            self.clock.as_ref(),
            &stop,
            &self.interrupt,
        );

        release.assert();
        match listener.join() {
            Ok(Ok(())) | Ok(Err(InteractionError::Interrupted)) => {}
            Ok(Err(err)) => warn!("[Session] Stop listener ended early: {}", err),
            Err(_) => warn!("[Session] Stop listener panicked"),
        }

        let trace = captured?;
        let levels = LevelDiscriminator::from_calibration(
            calibration,
            self.config.timing.hysteresis,
            self.config.timing.polarity,
        );
        let open_duration_seconds = trace.open_duration(&levels);
        let nominal = open_duration_seconds.and_then(|seconds| self.speeds.classify(seconds).ok());

        Ok(ProfileReport {
            calibration: *calibration,
            summary: trace.summary(),
            open_duration_seconds,
            nominal,
            trace,
        })
    }

    /// Report live readings until `limit` is reached or the interrupt fires.
    pub fn monitor<F>(
        &mut self,
        limit: Option<u64>,
        mut on_reading: F,
    ) -> Result<MonitorStats, SensorError>
    where
        F: FnMut(MonitorReading),
    {
        let monitor = LiveMonitor::from_config(&self.config.monitor);
        let mut seen = 0u64;
        monitor.run(self.channel.as_mut(), &self.interrupt, |reading| {
            on_reading(reading);
            seen += 1;
            if limit.is_some_and(|limit| seen >= limit) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
    }
}
