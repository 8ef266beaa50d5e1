//! This module defines the error types used by the `figure8-cycle` crate.

use crate::controller::ControllerMode;

/// Error type for cycle controller operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlError {
    /// A mode change that the controller's state machine does not allow,
    /// e.g. resuming a running controller or anything after a stop.
    InvalidTransition {
        /// Mode the controller was in.
        from: ControllerMode,
        /// Mode that was requested.
        to: ControllerMode,
    },
    /// The loop rate is not a positive, finite frequency.
    InvalidTickRate(f64),
    /// A controller option is out of range.
    InvalidOption(&'static str),
}

impl core::fmt::Display for ControlError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ControlError::InvalidTransition { from, to } => {
                write!(f, "Invalid mode transition: {} -> {}", from, to)
            }
            ControlError::InvalidTickRate(rate) => {
                write!(f, "Invalid tick rate: {} Hz (must be positive and finite)", rate)
            }
            ControlError::InvalidOption(msg) => write!(f, "Invalid controller option: {}", msg),
        }
    }
}

impl core::error::Error for ControlError {}
