//! Velocity profile of a unicycle robot tracking a parametric curve.
//!
//! From the unicycle model `ẋ = v cos θ`, `ẏ = v sin θ` the commands follow
//! directly from the curve derivatives:
//!
//! * `v = sqrt(ẋ² + ẏ²)`
//! * `θ = atan2(ẏ, ẋ)`
//! * `ω = dθ/dt = (ẋ ÿ − ẏ ẍ) / (ẋ² + ẏ²)`

use core::fmt;
use libm::{atan2, sqrt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::curve::{Curve, CurveFamily, CurveParameters, ParametricCurve};
use crate::{ChassisSpeeds, KinematicsError};

/// One evaluation of the engine at time `t`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KinematicSample {
    /// Sample time (s).
    pub t: f64,
    /// Curve x position (m).
    pub x: f64,
    /// Curve y position (m).
    pub y: f64,
    /// Forward speed (m/s). Never negative.
    pub v: f64,
    /// Heading (rad) in `[-PI, PI]`.
    pub theta: f64,
    /// Turn rate (rad/s).
    pub omega: f64,
}

impl KinematicSample {
    /// The commanded chassis speeds `(v, ω)`.
    pub fn chassis_speeds(&self) -> ChassisSpeeds {
        ChassisSpeeds::new(self.v, self.omega)
    }
}

impl fmt::Display for KinematicSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t: {:.3} s, (x: {:.3}, y: {:.3}), v: {:.3} m/s, ω: {:.3} rad/s",
            self.t, self.x, self.y, self.v, self.omega
        )
    }
}

/// Turn rate of a planar trajectory from its first and second derivatives.
///
/// Returns `0.0` when the trajectory is momentarily stationary
/// (`ẋ = ẏ = 0`), where the heading carries no information.
///
/// # Arguments
///
/// * `dx`, `dy`: First derivatives ẋ, ẏ.
/// * `ddx`, `ddy`: Second derivatives ẍ, ÿ.
pub fn angular_rate(dx: f64, dy: f64, ddx: f64, ddy: f64) -> f64 {
    let speed_sq = dx * dx + dy * dy;
    if speed_sq == 0.0 {
        return 0.0;
    }
    (dx * ddy - dy * ddx) / speed_sq
}

/// Trajectory kinematics engine.
///
/// Binds curve parameters to a [`ParametricCurve`] once and evaluates the
/// velocity profile for any sample time. Evaluation holds no mutable state,
/// so equal inputs always give bit-identical samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveKinematics<C = Curve> {
    params: CurveParameters,
    curve: C,
}

impl CurveKinematics<Curve> {
    /// Construct the engine for one of the built-in curve families.
    ///
    /// # Arguments
    ///
    /// * `params`: Width, height and period of the curve.
    /// * `family`: The curve family to bind.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidParameters)` if the period is not
    /// positive.
    pub fn new(params: CurveParameters, family: CurveFamily) -> Result<Self, KinematicsError> {
        params.validate()?;
        Ok(CurveKinematics { params, curve: Curve::bind(family, &params) })
    }

    /// The family the engine was built for.
    pub fn family(&self) -> CurveFamily {
        self.curve.family()
    }
}

impl<C: ParametricCurve> CurveKinematics<C> {
    /// Construct the engine around a caller-supplied curve.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidParameters)` if the period is not
    /// positive.
    pub fn from_curve(params: CurveParameters, curve: C) -> Result<Self, KinematicsError> {
        params.validate()?;
        Ok(CurveKinematics { params, curve })
    }

    /// Returns the bound parameters.
    pub fn params(&self) -> &CurveParameters {
        &self.params
    }

    /// Returns the bound curve.
    pub fn curve(&self) -> &C {
        &self.curve
    }

    /// Returns the configured period (s).
    pub fn period(&self) -> f64 {
        self.params.period
    }

    /// Evaluate position and velocity commands at time `t` (s).
    pub fn evaluate(&self, t: f64) -> KinematicSample {
        let d = self.curve.derivatives(t);
        KinematicSample {
            t,
            x: d.x,
            y: d.y,
            v: sqrt(d.dx * d.dx + d.dy * d.dy),
            theta: atan2(d.dy, d.dx),
            omega: angular_rate(d.dx, d.dy, d.ddx, d.ddy),
        }
    }

    /// Heading of the curve at `t = 0`, i.e. the orientation the robot must
    /// start in.
    pub fn initial_heading(&self) -> f64 {
        self.evaluate(0.0).theta
    }
}
