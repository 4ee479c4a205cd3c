//! Live sensor monitor.
//!
//! Prints nothing itself: each reading goes to a callback at a fixed
//! interval. Transient read failures are logged and retried after a backoff;
//! only fatal sensor errors end the loop early.

use std::ops::ControlFlow;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::warn;

use crate::config::MonitorConfig;
use crate::error::{log_sensor_error, ErrorCode, SensorError};
use crate::sensor::SensorChannel;
use crate::signal::StopSignal;

/// Longest single sleep, so pauses notice the interrupt quickly
const PAUSE_SLICE: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonitorReading {
    pub raw: f64,
    /// Present when the backend knows its voltage scale
    pub volts: Option<f64>,
}

/// Counters returned when the monitor stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub readings: u64,
    pub read_errors: u64,
}

#[derive(Debug, Clone)]
pub struct LiveMonitor {
    interval: Duration,
    error_backoff: Duration,
}

impl LiveMonitor {
    pub fn new(interval: Duration, error_backoff: Duration) -> Self {
        Self {
            interval,
            error_backoff,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            Duration::from_millis(config.interval_ms),
            Duration::from_millis(config.error_backoff_ms),
        )
    }

    /// Read until the callback breaks, the interrupt is asserted, or a fatal
    /// sensor error occurs.
    pub fn run<F>(
        &self,
        channel: &mut dyn SensorChannel,
        interrupt: &StopSignal,
        mut on_reading: F,
    ) -> Result<MonitorStats, SensorError>
    where
        F: FnMut(MonitorReading) -> ControlFlow<()>,
    {
        let mut stats = MonitorStats::default();

        while !interrupt.is_asserted() {
            match channel.sample() {
                Ok(raw) => {
                    stats.readings += 1;
                    let reading = MonitorReading {
                        raw,
                        volts: channel.to_volts(raw),
                    };
                    if on_reading(reading).is_break() {
                        break;
                    }
                    pause(self.interval, interrupt);
                }
                Err(err) if err.is_transient() => {
                    stats.read_errors += 1;
                    warn!(
                        "[LiveMonitor] {}; retrying in {:?}",
                        err.message(),
                        self.error_backoff
                    );
                    pause(self.error_backoff, interrupt);
                }
                Err(err) => {
                    log_sensor_error(&err, "LiveMonitor::run");
                    return Err(err);
                }
            }
        }

        Ok(stats)
    }
}

impl Default for LiveMonitor {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

fn pause(total: Duration, interrupt: &StopSignal) {
    let deadline = Instant::now() + total;
    loop {
        let now = Instant::now();
        if now >= deadline || interrupt.is_asserted() {
            return;
        }
        thread::sleep(PAUSE_SLICE.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedChannel;

    fn fast_monitor() -> LiveMonitor {
        LiveMonitor::new(Duration::ZERO, Duration::from_millis(1))
    }

    #[test]
    fn test_callback_break_stops_monitor() {
        let mut channel = ScriptedChannel::new(vec![1.0, 2.0, 3.0, 4.0]);
        let mut seen = Vec::new();

        let stats = fast_monitor()
            .run(&mut channel, &StopSignal::new(), |reading| {
                seen.push(reading.raw);
                if seen.len() == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();

        assert_eq!(seen, vec![1.0, 2.0, 3.0]);
        assert_eq!(stats.readings, 3);
        assert_eq!(stats.read_errors, 0);
    }

    #[test]
    fn test_transient_errors_are_retried() {
        let mut channel = ScriptedChannel::new(vec![10.0, 20.0]).with_failure_at(1);
        let mut seen = Vec::new();

        let stats = fast_monitor()
            .run(&mut channel, &StopSignal::new(), |reading| {
                seen.push(reading.raw);
                if seen.len() == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();

        assert_eq!(seen, vec![10.0, 20.0]);
        assert_eq!(stats.read_errors, 1);
        assert_eq!(channel.reads(), 3);
    }

    #[test]
    fn test_fatal_error_ends_monitor() {
        struct Unplugged;
        impl SensorChannel for Unplugged {
            fn sample(&mut self) -> Result<f64, SensorError> {
                Err(SensorError::BusInitialization {
                    details: "unplugged".to_string(),
                })
            }
            fn describe(&self) -> String {
                "unplugged".to_string()
            }
        }

        let result = fast_monitor().run(&mut Unplugged, &StopSignal::new(), |_| {
            ControlFlow::Continue(())
        });
        assert!(matches!(result, Err(SensorError::BusInitialization { .. })));
    }

    #[test]
    fn test_interrupt_stops_monitor() {
        let mut channel = ScriptedChannel::new(vec![1.0]).cycle();
        let interrupt = StopSignal::new();
        let trigger = interrupt.clone();

        let stats = LiveMonitor::new(Duration::from_secs(60), Duration::from_secs(60))
            .run(&mut channel, &interrupt, |_| {
                trigger.assert();
                ControlFlow::Continue(())
            })
            .unwrap();

        assert_eq!(stats.readings, 1);
    }
}
