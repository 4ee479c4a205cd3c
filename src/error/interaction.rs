// Errors raised while waiting on the operator

use crate::error::ErrorCode;
use std::fmt;

/// Interaction error code constants
///
/// Error code range: 4001-4002
pub struct InteractionErrorCodes {}

impl InteractionErrorCodes {
    /// The session interrupt was asserted while waiting
    pub const INTERRUPTED: i32 = 4001;

    /// The confirmation input was closed (e.g. stdin reached EOF)
    pub const INPUT_CLOSED: i32 = 4002;
}

/// Reasons a blocking confirmation wait can end without a confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionError {
    Interrupted,
    InputClosed,
}

impl ErrorCode for InteractionError {
    fn code(&self) -> i32 {
        match self {
            InteractionError::Interrupted => InteractionErrorCodes::INTERRUPTED,
            InteractionError::InputClosed => InteractionErrorCodes::INPUT_CLOSED,
        }
    }

    fn message(&self) -> String {
        match self {
            InteractionError::Interrupted => "Interrupted while waiting for confirmation",
            InteractionError::InputClosed => "Confirmation input closed",
        }
        .to_string()
    }
}

impl fmt::Display for InteractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InteractionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for InteractionError {}
