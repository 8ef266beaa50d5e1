use parking_lot::RwLock;
use std::{sync::Arc, time::Instant};

use figure8_cycle::ControllerMode;
use figure8_kinematics::KinematicSample;

#[derive(Clone)]
pub struct State {
    pub last_sample: Option<KinematicSample>,
    pub cycle_count: u64,
    pub mode: ControllerMode,
    pub last_tick_ts: Instant,
    pub faults: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        State {
            last_sample: None,
            cycle_count: 0,
            mode: ControllerMode::Running,
            last_tick_ts: Instant::now(),
            faults: Vec::new(),
        }
    }
}

pub type Blackboard = Arc<RwLock<State>>;

pub fn snapshot(bb: &Blackboard) -> State {
    (*bb.read()).clone()
}

/// Called from the cycle loop after every tick. A tick without a sample
/// (paused) keeps the last one.
pub fn record_tick(bb: &Blackboard, sample: Option<&KinematicSample>, cycle_count: u64, mode: ControllerMode) {
    let mut g = bb.write();
    if let Some(sample) = sample {
        g.last_sample = Some(*sample);
    }
    g.cycle_count = cycle_count;
    g.mode = mode;
    g.last_tick_ts = Instant::now();
}

pub fn raise_fault(bb: &Blackboard, msg: &str) {
    let mut g = bb.write();
    if !g.faults.iter().any(|s| s == msg) {
        g.faults.push(msg.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faults_are_deduplicated() {
        let bb: Blackboard = Arc::default();
        raise_fault(&bb, "cycle loop stalled");
        raise_fault(&bb, "cycle loop stalled");
        raise_fault(&bb, "path topic closed");
        assert_eq!(snapshot(&bb).faults, vec!["cycle loop stalled", "path topic closed"]);
    }

    #[test]
    fn test_paused_tick_keeps_last_sample() {
        let bb: Blackboard = Arc::default();
        let sample = KinematicSample { t: 1.0, x: 0.5, ..KinematicSample::default() };
        record_tick(&bb, Some(&sample), 0, ControllerMode::Running);
        let before = snapshot(&bb).last_tick_ts;

        record_tick(&bb, None, 0, ControllerMode::Paused);
        let state = snapshot(&bb);
        assert_eq!(state.last_sample, Some(sample));
        assert_eq!(state.mode, ControllerMode::Paused);
        assert!(state.last_tick_ts >= before);
    }
}
