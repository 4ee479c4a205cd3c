// ScriptedChannel - replays a fixed sample sequence

use std::thread;
use std::time::Duration;

use crate::error::SensorError;
use crate::sensor::SensorChannel;

/// Sensor channel that hands out a scripted list of samples.
///
/// Once the script runs out the channel fails with `ReadFailed`, unless it
/// was built with [`cycle`](Self::cycle).
#[derive(Debug, Clone)]
pub struct ScriptedChannel {
    samples: Vec<f64>,
    position: usize,
    reads: usize,
    cycle: bool,
    latency: Duration,
    fail_at: Option<usize>,
}

impl ScriptedChannel {
    pub fn new(samples: Vec<f64>) -> Self {
        Self {
            samples,
            position: 0,
            reads: 0,
            cycle: false,
            latency: Duration::ZERO,
            fail_at: None,
        }
    }

    /// Restart from the top instead of failing at the end
    pub fn cycle(mut self) -> Self {
        self.cycle = true;
        self
    }

    /// Sleep this long inside every read
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the read with this zero-based index once
    pub fn with_failure_at(mut self, read_index: usize) -> Self {
        self.fail_at = Some(read_index);
        self
    }

    /// Number of `sample()` calls so far, failed ones included
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl SensorChannel for ScriptedChannel {
    fn sample(&mut self) -> Result<f64, SensorError> {
        let index = self.reads;
        self.reads += 1;

        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }

        if self.fail_at == Some(index) {
            return Err(SensorError::ReadFailed {
                details: format!("scripted failure at read {}", index),
            });
        }

        if self.position >= self.samples.len() {
            if self.cycle && !self.samples.is_empty() {
                self.position = 0;
            } else {
                return Err(SensorError::ReadFailed {
                    details: "script exhausted".to_string(),
                });
            }
        }

        let sample = self.samples[self.position];
        self.position += 1;
        Ok(sample)
    }

    fn describe(&self) -> String {
        format!("scripted ({} samples)", self.samples.len())
    }
}
