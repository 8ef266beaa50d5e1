mod blackboard; // brings `blackboard.rs` in as `crate::blackboard`
mod bus; // brings `bus.rs` in as `crate::bus`
mod commands; // operator pause/resume/stop
mod frame; // static world -> odom frame
mod graphics; // brings `graphics.rs` in as `crate::graphics`
mod settings; // `config/default.toml` + environment overrides
mod telemetry;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use tracing::{error, info, warn};
use tracing_subscriber::{self, EnvFilter};

use blackboard::{Blackboard, raise_fault, record_tick, snapshot};
use bus::{Topic, VelocityFanout};
use figure8_cycle::{ControllerMode, ControllerOptions, CycleController, MonotonicClock, PathSnapshot, spawn_cycle_loop};
use figure8_kinematics::CurveKinematics;
use frame::{StaticFrameBroadcaster, StaticTransform};
use settings::{Settings, WatchdogSettings};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("figure8 started. Loading configuration...");
    let settings = settings::load_settings()?;
    run(settings)
}

fn run(settings: Settings) -> anyhow::Result<()> {
    let kinematics = CurveKinematics::new(settings.curve.parameters(), settings.curve.family)
        .context("cannot bind the configured curve")?;
    info!(
        family = %kinematics.family(),
        params = %kinematics.params(),
        initial_heading = kinematics.initial_heading(),
        "Curve bound"
    );

    let options = ControllerOptions {
        path_publish_every: settings.control.path_publish_every,
        path_capacity: settings.path_capacity_hint(),
        path_frame_id: Arc::from(settings.frame.parent.as_str()),
    };
    let controller: Arc<CycleController> = Arc::new(CycleController::new(kinematics, MonotonicClock::new(), options)?);

    let bb: Blackboard = Arc::default();
    let velocity = VelocityFanout::new(&settings.bus.velocity_topics, settings.bus.velocity_capacity);
    let topic_names: Vec<&str> = velocity.topics().iter().map(Topic::name).collect();
    info!(topics = ?topic_names, "Publishing velocity commands");
    let path_topic: Topic<PathSnapshot> = Topic::new("path", settings.bus.path_capacity);

    let frames = StaticFrameBroadcaster::new();
    let yaw = settings.frame.yaw.unwrap_or_else(|| controller.kinematics().initial_heading());
    frames.send_transform(StaticTransform::from_yaw(&settings.frame.parent, &settings.frame.child, yaw));

    // Subscribe before the loop starts so the first ticks have listeners.
    let telemetry_twist_rx = velocity
        .primary()
        .map(Topic::subscribe)
        .context("no velocity topic configured")?;
    let telemetry_path_rx = path_topic.subscribe();
    let vis_path_rx = settings.visualization.enabled.then(|| path_topic.subscribe());

    let tokio_rt = tokio::runtime::Runtime::new().context("failed to start the tokio runtime")?;

    info!("Spawning cycle thread...");
    let cycle_handle = spawn_cycle_loop(
        Arc::clone(&controller),
        velocity.clone(),
        path_topic.clone(),
        settings.control.tick_rate_hz,
        {
            let bb = Arc::clone(&bb);
            let controller = Arc::clone(&controller);
            move |sample| {
                let cycle = controller.cycle_state().cycle_count;
                record_tick(&bb, sample, cycle, controller.mode());
            }
        },
    )?;

    tokio_rt.spawn(supervised(
        "telemetry",
        telemetry::run_telemetry(telemetry_twist_rx, telemetry_path_rx, Arc::clone(&controller)),
    ));
    tokio_rt.spawn(supervised("watchdog", watchdog(Arc::clone(&bb), Arc::clone(&controller), settings.watchdog)));
    tokio_rt.spawn(supervised("operator", commands::operator_loop(Arc::clone(&controller))));
    tokio_rt.spawn(supervised("signals", commands::shutdown_on_ctrl_c(Arc::clone(&controller))));

    match vis_path_rx {
        Some(path_rx) => {
            info!("Opening visualization window...");
            let visualization = graphics::run_visualization_loop(
                path_rx,
                Arc::clone(&bb),
                frames.subscribe(),
                Arc::clone(&controller),
                settings.visualization.scale,
            );
            macroquad::Window::from_config(graphics::window_conf(), visualization);
            // Closing the window ends the run.
            if controller.mode() != ControllerMode::Stopped {
                let _ = controller.stop();
            }
        }
        None => tokio_rt.block_on(wait_for_stop(Arc::clone(&controller))),
    }

    cycle_handle.join().map_err(|_| anyhow!("cycle thread panicked"))?;
    let state = snapshot(&bb);
    info!(cycles = state.cycle_count, faults = ?state.faults, "figure8 finished.");
    tokio_rt.shutdown_timeout(Duration::from_millis(200));
    Ok(())
}

async fn supervised(name: &'static str, task: impl Future<Output = anyhow::Result<()>>) {
    match task.await {
        Ok(()) => info!(task = name, "Task finished successfully."),
        Err(e) => error!(task = name, "Task failed: {:?}", e),
    }
}

async fn wait_for_stop(controller: Arc<CycleController>) {
    let mut tick = tokio::time::interval(Duration::from_millis(50));
    while controller.mode() != ControllerMode::Stopped {
        tick.tick().await;
    }
}

/// Raises a fault when the cycle thread stops ticking. Paused ticks count
/// as ticks.
async fn watchdog(bb: Blackboard, controller: Arc<CycleController>, settings: WatchdogSettings) -> anyhow::Result<()> {
    info!("Watchdog task started.");
    let timeout = Duration::from_millis(settings.stall_timeout_ms);
    let mut tick = tokio::time::interval(Duration::from_millis(settings.period_ms));
    loop {
        tick.tick().await;
        if controller.mode() == ControllerMode::Stopped {
            break;
        }
        let last_tick_ts = snapshot(&bb).last_tick_ts;
        let age = last_tick_ts.elapsed();
        if age > timeout {
            warn!(?age, last_tick_ts = ?last_tick_ts, "Cycle thread stalled! Velocity commands are stale.");
            raise_fault(&bb, "cycle thread stalled");
        }
    }
    info!("Watchdog task finished.");
    Ok(())
}
