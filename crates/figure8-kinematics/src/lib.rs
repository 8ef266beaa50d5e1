#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library for open-loop curve tracking kinematics."]
#![doc = ""]
#![doc = "This crate binds parametric planar curves (circle, figure-eight) to closed-form"]
#![doc = "derivatives and evaluates the forward speed and turn rate a differential-drive"]
#![doc = "robot must follow to trace them."]

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod curve;
pub mod error;
pub mod trajectory;

pub use curve::{
    Circle, Curve, CurveDerivatives, CurveFamily, CurveParameters, FigureEight, ParametricCurve,
    PeriodicCircle,
};
pub use error::KinematicsError;
pub use trajectory::{CurveKinematics, KinematicSample, angular_rate};

/// A twist expressed in the robot base frame.
/// A twist represents the linear and angular velocities of the robot.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist {
    /// Linear x velocity (m/s) in the robot's base frame.
    pub vx: f64,
    /// Angular z velocity (rad/s) around the robot's base frame z-axis.
    pub wz: f64,
}

impl Twist {
    /// Construct a new twist.
    ///
    /// # Arguments
    ///
    /// * `vx`: Linear velocity along the robot's x-axis (m/s).
    /// * `wz`: Angular velocity around the robot's z-axis (rad/s).
    pub const fn new(vx: f64, wz: f64) -> Self {
        Twist { vx, wz }
    }
}

impl From<ChassisSpeeds> for Twist {
    fn from(speeds: ChassisSpeeds) -> Self {
        Twist::new(speeds.v, speeds.omega)
    }
}

impl fmt::Display for Twist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(vx: {:.2} m/s, ωz: {:.2} rad/s)", self.vx, self.wz)
    }
}

/// Linear and angular chassis velocities.
/// These represent the overall motion of the robot's chassis.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChassisSpeeds {
    /// Linear speed of the chassis center (m/s).
    pub v: f64,
    /// Angular speed of the chassis (rad/s).
    pub omega: f64,
}

impl ChassisSpeeds {
    /// Construct chassis speeds.
    ///
    /// # Arguments
    ///
    /// * `v`: Linear speed of the chassis center (m/s).
    /// * `omega`: Angular speed of the chassis (rad/s).
    pub const fn new(v: f64, omega: f64) -> Self {
        ChassisSpeeds { v, omega }
    }

    /// Both speeds zero.
    pub const fn stopped() -> Self {
        ChassisSpeeds { v: 0.0, omega: 0.0 }
    }
}

impl fmt::Display for ChassisSpeeds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(v: {:.2} m/s, ω: {:.2} rad/s)", self.v, self.omega)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twist_from_chassis_speeds() {
        let twist = Twist::from(ChassisSpeeds::new(0.4, -1.2));
        assert_eq!(twist, Twist::new(0.4, -1.2));
        assert_eq!(Twist::from(ChassisSpeeds::stopped()), Twist::default());
    }
}
