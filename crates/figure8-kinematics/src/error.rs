//! Error types for the kinematics library.
//!
//! The only failure the engine can report is a bad parameter set at
//! construction time; evaluation itself is total.

use core::fmt;

/// Errors that can occur while binding a curve.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// Error for invalid curve parameters.
    /// This variant is returned when the period is not a positive, finite number.
    InvalidParameters(&'static str),
}

impl fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::InvalidParameters(msg) => write!(f, "Invalid curve parameters: {}", msg),
        }
    }
}

impl core::error::Error for KinematicsError {}
