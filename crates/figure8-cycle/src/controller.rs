//! Cycle controller: samples the kinematics engine once per tick, records
//! the visited path and resets it on every period boundary.
//!
//! All mutable state sits behind one mutex that is held only while the tick
//! updates it. Emission into the sinks happens after the lock is released, so
//! a slow consumer never holds up `pause`/`resume`/`stop` or snapshot reads.
//! A consumer reading the buffer right after a boundary tick may see it
//! (nearly) empty.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{info, trace, warn};

use figure8_kinematics::{ChassisSpeeds, Curve, CurveKinematics, KinematicSample, ParametricCurve};

use crate::clock::{Clock, MonotonicClock};
use crate::error::ControlError;
use crate::path::{PathBuffer, PathPoint, PathSnapshot};
use crate::sink::{PathSink, VelocitySink};

/// Only the first and then every Nth sink failure is logged.
const SINK_FAILURE_LOG_EVERY: u64 = 1000;

/// Lifecycle of a [`CycleController`]. `Stopped` is terminal.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerMode {
    Running,
    Paused,
    Stopped,
}

impl fmt::Display for ControllerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerMode::Running => "running",
            ControllerMode::Paused => "paused",
            ControllerMode::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Time bookkeeping of the controller.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CycleState {
    /// Seconds along the curve. Frozen while paused.
    pub elapsed: f64,
    /// Total wall-clock seconds spent paused.
    pub pause_offset: f64,
    /// Completed traversals. Never decreases.
    pub cycle_count: u64,
}

/// Tuning knobs that are not part of the curve itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Emit a path snapshot every N ticks. `1` emits on every tick.
    pub path_publish_every: u32,
    /// Points to pre-allocate in the path buffer, typically
    /// `period * tick_rate`.
    pub path_capacity: usize,
    /// Frame the recorded path is expressed in.
    pub path_frame_id: Arc<str>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        ControllerOptions { path_publish_every: 1, path_capacity: 0, path_frame_id: Arc::from("world") }
    }
}

struct Inner {
    mode: ControllerMode,
    cycle: CycleState,
    paused_at: Option<f64>,
    path: PathBuffer,
    ticks: u64,
}

enum Step {
    Idle,
    Hold,
    Sampled { sample: KinematicSample, snapshot: Option<PathSnapshot> },
}

/// Drives a [`CurveKinematics`] engine in time and keeps the path of the
/// current traversal.
pub struct CycleController<K = Curve, C = MonotonicClock> {
    kinematics: CurveKinematics<K>,
    clock: C,
    start_time: f64,
    options: ControllerOptions,
    inner: Mutex<Inner>,
    velocity_failures: AtomicU64,
    path_failures: AtomicU64,
}

impl<K: ParametricCurve, C: Clock> CycleController<K, C> {
    /// Creates a running controller whose time origin is `clock.now()`.
    ///
    /// # Errors
    ///
    /// Returns `Err(ControlError::InvalidOption)` if `path_publish_every` is zero.
    pub fn new(kinematics: CurveKinematics<K>, clock: C, options: ControllerOptions) -> Result<Self, ControlError> {
        if options.path_publish_every == 0 {
            return Err(ControlError::InvalidOption("path_publish_every must be at least 1"));
        }
        let start_time = clock.now();
        info!(period = kinematics.period(), start_time, frame = %options.path_frame_id, "Cycle controller started");
        let path = PathBuffer::new(Arc::clone(&options.path_frame_id), options.path_capacity);
        Ok(Self {
            kinematics,
            clock,
            start_time,
            options,
            inner: Mutex::new(Inner {
                mode: ControllerMode::Running,
                cycle: CycleState::default(),
                paused_at: None,
                path,
                ticks: 0,
            }),
            velocity_failures: AtomicU64::new(0),
            path_failures: AtomicU64::new(0),
        })
    }

    /// Runs one tick.
    ///
    /// * `Running`: samples the curve at the current elapsed time, appends the
    ///   position to the path, emits `(v, ω)` and, when due, a path snapshot.
    ///   Returns the sample.
    /// * `Paused`: emits a zero command and returns `None`.
    /// * `Stopped`: does nothing and returns `None`.
    pub fn tick<V, P>(&self, velocity: &V, path: &P) -> Option<KinematicSample>
    where
        V: VelocitySink + ?Sized,
        P: PathSink + ?Sized,
    {
        match self.step() {
            Step::Idle => None,
            Step::Hold => {
                self.emit_velocity(velocity, ChassisSpeeds::stopped());
                None
            }
            Step::Sampled { sample, snapshot } => {
                self.emit_velocity(velocity, sample.chassis_speeds());
                if let Some(snapshot) = snapshot {
                    self.emit_path(path, snapshot);
                }
                Some(sample)
            }
        }
    }

    fn step(&self) -> Step {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        match inner.mode {
            ControllerMode::Stopped => return Step::Idle,
            ControllerMode::Paused => return Step::Hold,
            ControllerMode::Running => {}
        }

        let elapsed = self.running_elapsed(&inner, now);
        inner.cycle.elapsed = elapsed;

        let sample = self.kinematics.evaluate(elapsed);
        inner.path.push(PathPoint::new(sample.x, sample.y));

        // Boundaries are multiples of the configured period, whatever the curve.
        let completed = (elapsed / self.kinematics.period()).floor() as u64;
        if completed > inner.cycle.cycle_count {
            let crossed = completed - inner.cycle.cycle_count;
            let dropped = inner.path.len();
            inner.cycle.cycle_count = completed;
            inner.path.clear();
            if crossed > 1 {
                warn!(crossed, elapsed, "Several period boundaries crossed in a single tick");
            }
            info!(cycle = completed, elapsed, points = dropped, "Period boundary crossed, path buffer cleared");
        }

        inner.ticks += 1;
        let snapshot = (inner.ticks % u64::from(self.options.path_publish_every) == 0)
            .then(|| inner.path.snapshot(inner.cycle.cycle_count, now));

        trace!(t = sample.t, x = sample.x, y = sample.y, v = sample.v, omega = sample.omega, "Sampled curve");
        Step::Sampled { sample, snapshot }
    }

    fn running_elapsed(&self, inner: &Inner, now: f64) -> f64 {
        (now - self.start_time - inner.cycle.pause_offset).max(inner.cycle.elapsed)
    }

    fn emit_velocity<V: VelocitySink + ?Sized>(&self, sink: &V, cmd: ChassisSpeeds) {
        if let Err(e) = sink.send_velocity(cmd) {
            let failures = self.velocity_failures.fetch_add(1, Ordering::Relaxed) + 1;
            if failures % SINK_FAILURE_LOG_EVERY == 1 {
                warn!(error = %e, failures, "Velocity sink rejected command");
            }
        }
    }

    fn emit_path<P: PathSink + ?Sized>(&self, sink: &P, snapshot: PathSnapshot) {
        if let Err(e) = sink.send_path(snapshot) {
            let failures = self.path_failures.fetch_add(1, Ordering::Relaxed) + 1;
            if failures % SINK_FAILURE_LOG_EVERY == 1 {
                warn!(error = %e, failures, "Path sink rejected snapshot");
            }
        }
    }

    /// Freezes elapsed time until [`resume`](Self::resume).
    ///
    /// # Errors
    ///
    /// Returns `Err(ControlError::InvalidTransition)` unless the controller is running.
    pub fn pause(&self) -> Result<(), ControlError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        if inner.mode != ControllerMode::Running {
            return Err(ControlError::InvalidTransition { from: inner.mode, to: ControllerMode::Paused });
        }
        let elapsed = self.running_elapsed(&inner, now);
        inner.cycle.elapsed = elapsed;
        inner.paused_at = Some(now);
        inner.mode = ControllerMode::Paused;
        info!(elapsed, "Cycle controller paused");
        Ok(())
    }

    /// Continues from the elapsed time at which the controller was paused.
    ///
    /// # Errors
    ///
    /// Returns `Err(ControlError::InvalidTransition)` unless the controller is paused.
    pub fn resume(&self) -> Result<(), ControlError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        if inner.mode != ControllerMode::Paused {
            return Err(ControlError::InvalidTransition { from: inner.mode, to: ControllerMode::Running });
        }
        let paused_at = inner.paused_at.take().unwrap_or(now);
        let gap = (now - paused_at).max(0.0);
        inner.cycle.pause_offset += gap;
        inner.mode = ControllerMode::Running;
        info!(gap, pause_offset = inner.cycle.pause_offset, "Cycle controller resumed");
        Ok(())
    }

    /// Stops the controller for good. Later ticks are no-ops.
    ///
    /// # Errors
    ///
    /// Returns `Err(ControlError::InvalidTransition)` if already stopped.
    pub fn stop(&self) -> Result<(), ControlError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        match inner.mode {
            ControllerMode::Stopped => {
                return Err(ControlError::InvalidTransition {
                    from: ControllerMode::Stopped,
                    to: ControllerMode::Stopped,
                });
            }
            ControllerMode::Running => {
                let elapsed = self.running_elapsed(&inner, now);
                inner.cycle.elapsed = elapsed;
            }
            ControllerMode::Paused => {}
        }
        inner.paused_at = None;
        inner.mode = ControllerMode::Stopped;
        info!(
            elapsed = inner.cycle.elapsed,
            cycles = inner.cycle.cycle_count,
            ticks = inner.ticks,
            "Cycle controller stopped"
        );
        Ok(())
    }

    pub fn mode(&self) -> ControllerMode {
        self.inner.lock().mode
    }

    /// Current elapsed time along the curve (s).
    pub fn elapsed(&self) -> f64 {
        self.cycle_state().elapsed
    }

    /// Consistent copy of the time bookkeeping.
    pub fn cycle_state(&self) -> CycleState {
        let now = self.clock.now();
        let inner = self.inner.lock();
        let mut state = inner.cycle;
        if inner.mode == ControllerMode::Running {
            state.elapsed = self.running_elapsed(&inner, now);
        }
        state
    }

    /// View of the path drawn since the last boundary.
    pub fn path_snapshot(&self) -> PathSnapshot {
        let now = self.clock.now();
        let inner = self.inner.lock();
        inner.path.snapshot(inner.cycle.cycle_count, now)
    }

    pub fn path_len(&self) -> usize {
        self.inner.lock().path.len()
    }

    pub fn kinematics(&self) -> &CurveKinematics<K> {
        &self.kinematics
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sink::NullSink;
    use figure8_kinematics::{CurveFamily, CurveParameters};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const EPSILON: f64 = 1e-9;

    #[derive(Default)]
    struct RecordingSink {
        velocities: Mutex<Vec<ChassisSpeeds>>,
        paths: Mutex<Vec<PathSnapshot>>,
    }

    impl VelocitySink for RecordingSink {
        fn send_velocity(&self, cmd: ChassisSpeeds) -> anyhow::Result<()> {
            self.velocities.lock().push(cmd);
            Ok(())
        }
    }

    impl PathSink for RecordingSink {
        fn send_path(&self, snapshot: PathSnapshot) -> anyhow::Result<()> {
            self.paths.lock().push(snapshot);
            Ok(())
        }
    }

    struct FailingSink;

    impl VelocitySink for FailingSink {
        fn send_velocity(&self, _cmd: ChassisSpeeds) -> anyhow::Result<()> {
            anyhow::bail!("transport down")
        }
    }

    impl PathSink for FailingSink {
        fn send_path(&self, _snapshot: PathSnapshot) -> anyhow::Result<()> {
            anyhow::bail!("transport down")
        }
    }

    fn controller(family: CurveFamily, period: f64) -> (CycleController<Curve, ManualClock>, ManualClock) {
        let clock = ManualClock::new(100.0);
        let kinematics = CurveKinematics::new(CurveParameters::new(5.0, 4.0, period), family).unwrap();
        let controller = CycleController::new(kinematics, clock.clone(), ControllerOptions::default()).unwrap();
        (controller, clock)
    }

    #[test]
    fn test_rejects_zero_publish_divider() {
        let kinematics = CurveKinematics::new(CurveParameters::default(), CurveFamily::Circle).unwrap();
        let options = ControllerOptions { path_publish_every: 0, ..ControllerOptions::default() };
        let result = CycleController::new(kinematics, ManualClock::new(0.0), options);
        assert!(matches!(result, Err(ControlError::InvalidOption(_))));
    }

    #[test]
    fn test_end_to_end_quarter_samples() {
        let (controller, clock) = controller(CurveFamily::PeriodicCircle, 60.0);
        let sink = RecordingSink::default();
        let expected = [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)];

        for (i, (x, y)) in expected.iter().enumerate() {
            clock.set(100.0 + 15.0 * i as f64);
            let sample = controller.tick(&sink, &sink).unwrap();
            assert!((sample.x - x).abs() < EPSILON);
            assert!((sample.y - y).abs() < EPSILON);
            assert_eq!(controller.cycle_state().cycle_count, 0);
            assert_eq!(controller.path_len(), i + 1);
        }

        clock.set(160.0);
        let sample = controller.tick(&sink, &sink).unwrap();
        assert!((sample.x - 1.0).abs() < EPSILON);
        assert!(sample.y.abs() < EPSILON);
        assert_eq!(controller.cycle_state().cycle_count, 1);
        assert_eq!(controller.path_len(), 0);

        let paths = sink.paths.lock();
        assert_eq!(paths.len(), 5);
        assert_eq!(paths[3].len(), 4);
        assert!(paths[4].is_empty());
        assert_eq!(paths[4].cycle, 1);
        assert_eq!(sink.velocities.lock().len(), 5);
    }

    #[test]
    fn test_first_point_after_boundary_starts_fresh_path() {
        let (controller, clock) = controller(CurveFamily::FigureEight, 60.0);
        clock.set(159.9);
        controller.tick(&NullSink, &NullSink);
        clock.set(160.05);
        controller.tick(&NullSink, &NullSink);
        assert_eq!(controller.cycle_state().cycle_count, 1);
        assert!(controller.path_snapshot().is_empty());

        clock.set(160.1);
        let sample = controller.tick(&NullSink, &NullSink).unwrap();
        let path = controller.path_snapshot();
        assert_eq!(path.len(), 1);
        let expected = controller.kinematics().evaluate(sample.t);
        assert_eq!(path.get(0), Some(&PathPoint::new(expected.x, expected.y)));
        assert_eq!(&*path.frame_id, "world");
        assert_eq!(path.stamp, 160.1);
        assert!((sample.t - 60.1).abs() < 1e-6);
    }

    #[test]
    fn test_jittered_ticks_cross_boundary_once() {
        let (controller, clock) = controller(CurveFamily::Circle, 2.0);
        let mut rng = StdRng::seed_from_u64(7);
        clock.set(101.5);

        let mut last_count = 0;
        let mut increments = 0;
        while clock.now() < 102.5 {
            controller.tick(&NullSink, &NullSink);
            let count = controller.cycle_state().cycle_count;
            assert!(count >= last_count);
            increments += count - last_count;
            last_count = count;
            clock.advance(rng.random_range(0.0002..0.0031));
        }
        assert_eq!(increments, 1);
        assert_eq!(last_count, 1);
    }

    #[test]
    fn test_pause_interval_does_not_count() {
        let (controller, clock) = controller(CurveFamily::Circle, 60.0);
        clock.advance(10.0);
        controller.tick(&NullSink, &NullSink);
        controller.pause().unwrap();
        assert_eq!(controller.mode(), ControllerMode::Paused);

        clock.advance(5.0);
        assert!((controller.elapsed() - 10.0).abs() < EPSILON);

        controller.resume().unwrap();
        clock.advance(3.0);
        assert!((controller.elapsed() - 13.0).abs() < EPSILON);
        assert!((controller.cycle_state().pause_offset - 5.0).abs() < EPSILON);

        let sample = controller.tick(&NullSink, &NullSink).unwrap();
        assert!((sample.t - 13.0).abs() < EPSILON);
    }

    #[test]
    fn test_paused_tick_commands_standstill() {
        let (controller, clock) = controller(CurveFamily::Circle, 60.0);
        let sink = RecordingSink::default();
        clock.advance(1.0);
        controller.tick(&sink, &sink);
        controller.pause().unwrap();
        clock.advance(1.0);
        assert!(controller.tick(&sink, &sink).is_none());

        assert_eq!(controller.path_len(), 1);
        let velocities = sink.velocities.lock();
        assert_eq!(velocities.len(), 2);
        assert_eq!(velocities[1], ChassisSpeeds::stopped());
        assert_eq!(sink.paths.lock().len(), 1);
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let (controller, _clock) = controller(CurveFamily::Circle, 60.0);
        assert_eq!(
            controller.resume(),
            Err(ControlError::InvalidTransition { from: ControllerMode::Running, to: ControllerMode::Running })
        );
        controller.pause().unwrap();
        assert_eq!(
            controller.pause(),
            Err(ControlError::InvalidTransition { from: ControllerMode::Paused, to: ControllerMode::Paused })
        );
        controller.stop().unwrap();
        assert!(controller.resume().is_err());
        assert!(controller.pause().is_err());
        assert!(controller.stop().is_err());
        assert_eq!(controller.mode(), ControllerMode::Stopped);
    }

    #[test]
    fn test_stopped_controller_ignores_ticks() {
        let (controller, clock) = controller(CurveFamily::Circle, 60.0);
        let sink = RecordingSink::default();
        clock.advance(2.0);
        controller.tick(&sink, &sink);
        controller.stop().unwrap();
        clock.advance(100.0);
        assert!(controller.tick(&sink, &sink).is_none());
        assert_eq!(controller.path_len(), 1);
        assert_eq!(controller.cycle_state().cycle_count, 0);
        assert!((controller.elapsed() - 2.0).abs() < EPSILON);
        assert_eq!(sink.velocities.lock().len(), 1);
    }

    #[test]
    fn test_sink_failures_do_not_stall_ticks() {
        let (controller, clock) = controller(CurveFamily::Circle, 60.0);
        for _ in 0..5 {
            clock.advance(0.001);
            assert!(controller.tick(&FailingSink, &FailingSink).is_some());
        }
        assert_eq!(controller.path_len(), 5);
        assert_eq!(controller.velocity_failures.load(Ordering::Relaxed), 5);
        assert_eq!(controller.path_failures.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_path_snapshots_follow_divider() {
        let clock = ManualClock::new(0.0);
        let kinematics = CurveKinematics::new(CurveParameters::default(), CurveFamily::Circle).unwrap();
        let options =
            ControllerOptions { path_publish_every: 3, path_capacity: 16, path_frame_id: Arc::from("odom") };
        let controller = CycleController::new(kinematics, clock.clone(), options).unwrap();
        let sink = RecordingSink::default();
        for _ in 0..7 {
            clock.advance(0.01);
            controller.tick(&sink, &sink);
        }
        let paths = sink.paths.lock();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].len(), 3);
        assert_eq!(paths[1].len(), 6);
        assert_eq!(sink.velocities.lock().len(), 7);
    }

    #[test]
    fn test_long_stall_catches_up_cycle_count() {
        let (controller, clock) = controller(CurveFamily::Circle, 1.0);
        clock.advance(0.5);
        controller.tick(&NullSink, &NullSink);
        clock.advance(3.0);
        controller.tick(&NullSink, &NullSink);
        assert_eq!(controller.cycle_state().cycle_count, 3);
        assert_eq!(controller.path_len(), 0);
    }
}
