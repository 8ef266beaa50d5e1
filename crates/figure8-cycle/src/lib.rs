//! Cycle controller for open-loop curve tracking.
//!
//! A [`CycleController`] samples a [`CurveKinematics`](figure8_kinematics::CurveKinematics)
//! engine at a fixed rate, emits the commanded `(v, ω)` to a [`VelocitySink`],
//! keeps the path drawn in the current traversal and clears it whenever
//! elapsed time crosses a multiple of the curve period.

pub mod clock;
pub mod controller;
pub mod error;
pub mod path;
pub mod sink;
pub mod ticker;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use controller::{ControllerMode, ControllerOptions, CycleController, CycleState};
pub use error::ControlError;
pub use path::{PathBuffer, PathPoint, PathSnapshot};
pub use sink::{NullSink, PathSink, VelocitySink};
pub use ticker::{FixedRateTicker, spawn_cycle_loop};
