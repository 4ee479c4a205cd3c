// SimulatedOperator - answers prompts by moving the simulated shutter

use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::InteractionError;
use crate::prompt::{ConfirmationSource, Prompt};
use crate::sensor::{ShutterControl, ShutterMode};
use crate::signal::StopSignal;

const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Operator stand-in for the simulated backend.
///
/// Holds the shutter closed or open for the calibration prompts, starts
/// firing when measurement or recording begins, and confirms the stop prompt
/// after `record_for` has elapsed.
#[derive(Debug, Clone)]
pub struct SimulatedOperator {
    control: ShutterControl,
    record_for: Duration,
}

impl SimulatedOperator {
    pub fn new(control: ShutterControl, record_for: Duration) -> Self {
        Self {
            control,
            record_for,
        }
    }
}

impl ConfirmationSource for SimulatedOperator {
    fn confirm(&self, prompt: Prompt, interrupt: &StopSignal) -> Result<(), InteractionError> {
        if interrupt.is_asserted() {
            return Err(InteractionError::Interrupted);
        }
        debug!("[SimulatedOperator] {:?}", prompt);

        match prompt {
            Prompt::HoldShutterClosed => self.control.set(ShutterMode::HeldClosed),
            Prompt::HoldShutterOpen => self.control.set(ShutterMode::HeldOpen),
            Prompt::ReadyToMeasure | Prompt::StartRecording => {
                self.control.set(ShutterMode::Firing)
            }
            Prompt::StopRecording => {
                let deadline = Instant::now() + self.record_for;
                loop {
                    if interrupt.is_asserted() {
                        return Err(InteractionError::Interrupted);
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::sleep(WAIT_SLICE.min(deadline - now));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulatedConfig;
    use crate::sensor::SimulatedShutter;

    #[test]
    fn test_prompts_move_shutter() {
        let shutter = SimulatedShutter::new(&SimulatedConfig::default());
        let control = shutter.control();
        let operator = SimulatedOperator::new(control.clone(), Duration::ZERO);
        let interrupt = StopSignal::new();

        operator.confirm(Prompt::HoldShutterOpen, &interrupt).unwrap();
        assert_eq!(control.mode(), Some(ShutterMode::HeldOpen));

        operator.confirm(Prompt::HoldShutterClosed, &interrupt).unwrap();
        assert_eq!(control.mode(), Some(ShutterMode::HeldClosed));

        operator.confirm(Prompt::StartRecording, &interrupt).unwrap();
        assert_eq!(control.mode(), Some(ShutterMode::Firing));
    }

    #[test]
    fn test_stop_wait_is_interruptible() {
        let shutter = SimulatedShutter::new(&SimulatedConfig::default());
        let operator = SimulatedOperator::new(shutter.control(), Duration::from_secs(60));
        let interrupt = StopSignal::new();

        let trigger = interrupt.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            trigger.assert();
        });

        let started = Instant::now();
        let result = operator.confirm(Prompt::StopRecording, &interrupt);
        handle.join().unwrap();

        assert_eq!(result, Err(InteractionError::Interrupted));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
