//! Fixed-rate pacing of the controller on a dedicated thread.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Context;
use spin_sleep::SpinSleeper;
use tracing::{debug, info};

use figure8_kinematics::{KinematicSample, ParametricCurve};

use crate::clock::Clock;
use crate::controller::{ControllerMode, CycleController};
use crate::error::ControlError;
use crate::sink::{PathSink, VelocitySink};

/// Native sleep accuracy handed to the spin sleeper (ns).
const SLEEP_ACCURACY_NS: u32 = 100_000;

/// Sleeps until successive deadlines spaced `1 / rate` apart.
///
/// When the caller falls behind, missed deadlines are dropped rather than
/// replayed back to back.
pub struct FixedRateTicker {
    interval: Duration,
    next: Instant,
    sleeper: SpinSleeper,
}

impl FixedRateTicker {
    /// # Errors
    ///
    /// Returns `Err(ControlError::InvalidTickRate)` if `rate_hz` is not a
    /// positive, finite frequency or its period does not fit a `Duration`.
    pub fn new(rate_hz: f64) -> Result<Self, ControlError> {
        if !rate_hz.is_finite() || rate_hz <= 0.0 {
            return Err(ControlError::InvalidTickRate(rate_hz));
        }
        let interval = Duration::try_from_secs_f64(1.0 / rate_hz).map_err(|_| ControlError::InvalidTickRate(rate_hz))?;
        Ok(Self {
            interval,
            next: Instant::now() + interval,
            sleeper: SpinSleeper::new(SLEEP_ACCURACY_NS),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Blocks until the next deadline. Returns how many deadlines were
    /// skipped because the previous iteration overran.
    pub fn wait(&mut self) -> u64 {
        let now = Instant::now();
        if now < self.next {
            self.sleeper.sleep(self.next - now);
            self.next += self.interval;
            return 0;
        }

        let behind = now - self.next;
        let interval_ns = self.interval.as_nanos().max(1);
        let skipped = (behind.as_nanos() / interval_ns) as u64;
        let advance_ns = (u128::from(skipped) + 1) * interval_ns;
        self.next += Duration::from_nanos(u64::try_from(advance_ns).unwrap_or(u64::MAX));
        skipped
    }
}

/// Runs `controller` at `rate_hz` on a thread named `cycle` until it is
/// stopped.
///
/// `on_tick` is called after every tick with the sample, if one was taken.
///
/// # Errors
///
/// Fails if the rate is invalid or the thread cannot be spawned.
pub fn spawn_cycle_loop<K, C, V, P, F>(
    controller: Arc<CycleController<K, C>>,
    velocity: V,
    path: P,
    rate_hz: f64,
    mut on_tick: F,
) -> anyhow::Result<JoinHandle<()>>
where
    K: ParametricCurve + Send + Sync + 'static,
    C: Clock + 'static,
    V: VelocitySink + Send + 'static,
    P: PathSink + Send + 'static,
    F: FnMut(Option<&KinematicSample>) + Send + 'static,
{
    let mut ticker = FixedRateTicker::new(rate_hz)?;
    let handle = std::thread::Builder::new()
        .name("cycle".into())
        .spawn(move || {
            info!(rate_hz, interval = ?ticker.interval(), "Cycle loop started");
            let mut dropped: u64 = 0;
            while controller.mode() != ControllerMode::Stopped {
                let skipped = ticker.wait();
                if skipped > 0 {
                    dropped += skipped;
                    debug!(skipped, dropped, "Cycle loop fell behind, dropping ticks");
                }
                let sample = controller.tick(&velocity, &path);
                on_tick(sample.as_ref());
            }
            info!(dropped, "Cycle loop finished");
        })
        .context("failed to spawn cycle loop thread")?;
    Ok(handle)
}
