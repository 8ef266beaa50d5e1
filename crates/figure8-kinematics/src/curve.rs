//! Parametric planar curves with closed-form derivatives.
//!
//! Every curve here is twice continuously differentiable in `t`, and each
//! variant carries its own hand-derived first and second derivatives so the
//! engine never differentiates numerically.

use core::f64::consts::PI;
use core::fmt;
use libm::{cos, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::KinematicsError;

/// Numeric parameters shared by every curve family.
///
/// `width` and `height` are stored even for families that ignore them.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveParameters {
    /// Total width of the curve (m).
    pub width: f64,
    /// Total height of the curve (m).
    pub height: f64,
    /// Time to complete one traversal (s). Must be positive.
    pub period: f64,
}

impl CurveParameters {
    /// Construct a new parameter set. Validation happens when the set is bound
    /// to a curve.
    ///
    /// # Arguments
    ///
    /// * `width`: Total width of the curve in meters.
    /// * `height`: Total height of the curve in meters.
    /// * `period`: Time in seconds to complete one traversal.
    pub const fn new(width: f64, height: f64, period: f64) -> Self {
        CurveParameters { width, height, period }
    }

    /// Checks the parameter invariants.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidParameters)` if `period` is not a
    /// positive, finite number.
    pub fn validate(&self) -> Result<(), KinematicsError> {
        if !self.period.is_finite() || self.period <= 0.0 {
            return Err(KinematicsError::InvalidParameters("period must be positive and finite"));
        }
        Ok(())
    }
}

impl Default for CurveParameters {
    fn default() -> Self {
        CurveParameters::new(5.0, 4.0, 60.0)
    }
}

impl fmt::Display for CurveParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(W: {:.2} m, H: {:.2} m, T: {:.2} s)", self.width, self.height, self.period)
    }
}

/// Selects which parametric family a [`Curve`] is bound to.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurveFamily {
    /// `x = cos t`, `y = sin t`. Unit speed, unit turn rate.
    #[default]
    Circle,
    /// The unit circle traversed once per period:
    /// `x = cos(2πt/T)`, `y = sin(2πt/T)`.
    PeriodicCircle,
    /// `x = (W/2) sin(2πt/T)`, `y = (H/2) sin(4πt/T)`.
    FigureEight,
}

impl fmt::Display for CurveFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CurveFamily::Circle => "circle",
            CurveFamily::PeriodicCircle => "periodic circle",
            CurveFamily::FigureEight => "figure eight",
        };
        f.write_str(name)
    }
}

/// Position and its first two time derivatives at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CurveDerivatives {
    /// x(t)
    pub x: f64,
    /// y(t)
    pub y: f64,
    /// ẋ(t)
    pub dx: f64,
    /// ẏ(t)
    pub dy: f64,
    /// ẍ(t)
    pub ddx: f64,
    /// ÿ(t)
    pub ddy: f64,
}

/// A planar curve `x(t), y(t)` that can report exact derivatives.
///
/// Implementations must be pure: the same `t` always yields the same
/// derivatives.
pub trait ParametricCurve {
    /// Position, velocity and acceleration of the curve at `t`.
    fn derivatives(&self, t: f64) -> CurveDerivatives;

    /// Position of the curve at `t`.
    fn position(&self, t: f64) -> (f64, f64) {
        let d = self.derivatives(t);
        (d.x, d.y)
    }
}

/// Unit circle with unit angular frequency.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Circle;

impl ParametricCurve for Circle {
    fn derivatives(&self, t: f64) -> CurveDerivatives {
        let (s, c) = (sin(t), cos(t));
        CurveDerivatives { x: c, y: s, dx: -s, dy: c, ddx: -c, ddy: -s }
    }
}

/// Unit circle traversed once every `period` seconds.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicCircle {
    rate: f64,
}

impl PeriodicCircle {
    /// Bind the circle to a period. The caller is responsible for having
    /// validated `params`.
    pub fn new(params: &CurveParameters) -> Self {
        PeriodicCircle { rate: 2.0 * PI / params.period }
    }
}

impl ParametricCurve for PeriodicCircle {
    fn derivatives(&self, t: f64) -> CurveDerivatives {
        let a = self.rate;
        let (s, c) = (sin(a * t), cos(a * t));
        CurveDerivatives {
            x: c,
            y: s,
            dx: -a * s,
            dy: a * c,
            ddx: -a * a * c,
            ddy: -a * a * s,
        }
    }
}

/// Lissajous figure-eight spanning `width` x `height`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FigureEight {
    half_width: f64,
    half_height: f64,
    /// 2π/T, the x-axis angular frequency.
    rate_x: f64,
    /// 4π/T, the y-axis angular frequency.
    rate_y: f64,
}

impl FigureEight {
    /// Bind the figure-eight to width, height and period. The caller is
    /// responsible for having validated `params`.
    pub fn new(params: &CurveParameters) -> Self {
        FigureEight {
            half_width: params.width / 2.0,
            half_height: params.height / 2.0,
            rate_x: 2.0 * PI / params.period,
            rate_y: 4.0 * PI / params.period,
        }
    }
}

impl ParametricCurve for FigureEight {
    fn derivatives(&self, t: f64) -> CurveDerivatives {
        let (a, b) = (self.rate_x, self.rate_y);
        let (sa, ca) = (sin(a * t), cos(a * t));
        let (sb, cb) = (sin(b * t), cos(b * t));
        CurveDerivatives {
            x: self.half_width * sa,
            y: self.half_height * sb,
            dx: self.half_width * a * ca,
            dy: self.half_height * b * cb,
            ddx: -self.half_width * a * a * sa,
            ddy: -self.half_height * b * b * sb,
        }
    }
}

/// A curve family bound to concrete parameters.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Curve {
    /// See [`Circle`].
    Circle(Circle),
    /// See [`PeriodicCircle`].
    PeriodicCircle(PeriodicCircle),
    /// See [`FigureEight`].
    FigureEight(FigureEight),
}

impl Curve {
    /// Bind `family` to `params`.
    pub fn bind(family: CurveFamily, params: &CurveParameters) -> Self {
        match family {
            CurveFamily::Circle => Curve::Circle(Circle),
            CurveFamily::PeriodicCircle => Curve::PeriodicCircle(PeriodicCircle::new(params)),
            CurveFamily::FigureEight => Curve::FigureEight(FigureEight::new(params)),
        }
    }

    /// The family this curve was bound from.
    pub fn family(&self) -> CurveFamily {
        match self {
            Curve::Circle(_) => CurveFamily::Circle,
            Curve::PeriodicCircle(_) => CurveFamily::PeriodicCircle,
            Curve::FigureEight(_) => CurveFamily::FigureEight,
        }
    }
}

impl ParametricCurve for Curve {
    fn derivatives(&self, t: f64) -> CurveDerivatives {
        match self {
            Curve::Circle(c) => c.derivatives(t),
            Curve::PeriodicCircle(c) => c.derivatives(t),
            Curve::FigureEight(c) => c.derivatives(t),
        }
    }
}
