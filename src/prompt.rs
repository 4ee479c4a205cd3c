//! Operator interaction boundary.
//!
//! Calibration and trace capture pause for the operator at fixed points. The
//! engine only sees [`ConfirmationSource`]; the CLI plugs in [`StdinPrompt`]
//! and tests plug in [`AutoConfirm`] or the simulated operator.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::error::InteractionError;
use crate::signal::StopSignal;

/// How often a blocked wait re-checks the interrupt
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Points at which the session needs the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    HoldShutterClosed,
    HoldShutterOpen,
    /// Informational: measuring starts right away
    ReadyToMeasure,
    StartRecording,
    StopRecording,
}

impl Prompt {
    pub fn message(&self) -> &'static str {
        match self {
            Prompt::HoldShutterClosed => "Close shutter and press Enter...",
            Prompt::HoldShutterOpen => "Open shutter and press Enter...",
            Prompt::ReadyToMeasure => "Measuring. Fire the shutter; press Ctrl+C to stop.",
            Prompt::StartRecording => "Press Enter to start recording...",
            Prompt::StopRecording => "Recording started! Press Enter to stop...",
        }
    }

    /// Whether the session blocks until the operator confirms
    pub fn awaits_input(&self) -> bool {
        !matches!(self, Prompt::ReadyToMeasure)
    }
}

/// Blocking confirmation primitive.
///
/// Implementations must return `Err(InteractionError::Interrupted)` promptly
/// once `interrupt` is asserted.
pub trait ConfirmationSource: Send + Sync {
    fn confirm(&self, prompt: Prompt, interrupt: &StopSignal) -> Result<(), InteractionError>;
}

/// Confirmation by pressing Enter on stdin.
///
/// A reader thread forwards lines over a channel so that waits can time out
/// and observe the interrupt instead of blocking inside `read_line`.
pub struct StdinPrompt {
    lines: Mutex<Receiver<String>>,
}

impl StdinPrompt {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });
        Self {
            lines: Mutex::new(rx),
        }
    }
}

impl ConfirmationSource for StdinPrompt {
    fn confirm(&self, prompt: Prompt, interrupt: &StopSignal) -> Result<(), InteractionError> {
        eprintln!("{}", prompt.message());
        if !prompt.awaits_input() {
            return Ok(());
        }

        let lines = self
            .lines
            .lock()
            .map_err(|_| InteractionError::InputClosed)?;
        loop {
            if interrupt.is_asserted() {
                return Err(InteractionError::Interrupted);
            }
            match lines.recv_timeout(INTERRUPT_POLL) {
                Ok(_) => {
                    debug!("[Prompt] {:?} confirmed", prompt);
                    return Ok(());
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(InteractionError::InputClosed),
            }
        }
    }
}

/// Confirms every prompt immediately and remembers what was asked.
#[derive(Debug, Default)]
pub struct AutoConfirm {
    seen: Mutex<Vec<Prompt>>,
}

impl AutoConfirm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

impl ConfirmationSource for AutoConfirm {
    fn confirm(&self, prompt: Prompt, interrupt: &StopSignal) -> Result<(), InteractionError> {
        if interrupt.is_asserted() {
            return Err(InteractionError::Interrupted);
        }
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(prompt);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_confirm_records_prompts() {
        let prompts = AutoConfirm::new();
        let interrupt = StopSignal::new();

        prompts
            .confirm(Prompt::HoldShutterClosed, &interrupt)
            .unwrap();
        prompts.confirm(Prompt::HoldShutterOpen, &interrupt).unwrap();

        assert_eq!(
            prompts.prompts(),
            vec![Prompt::HoldShutterClosed, Prompt::HoldShutterOpen]
        );
    }

    #[test]
    fn test_auto_confirm_honours_interrupt() {
        let prompts = AutoConfirm::new();
        let interrupt = StopSignal::new();
        interrupt.assert();

        assert_eq!(
            prompts.confirm(Prompt::StartRecording, &interrupt),
            Err(InteractionError::Interrupted)
        );
        assert!(prompts.prompts().is_empty());
    }

    #[test]
    fn test_only_ready_to_measure_is_informational() {
        assert!(!Prompt::ReadyToMeasure.awaits_input());
        assert!(Prompt::HoldShutterClosed.awaits_input());
        assert!(Prompt::StopRecording.awaits_input());
    }
}
