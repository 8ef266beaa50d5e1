use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;
use tracing::{debug, info, warn};

use figure8_cycle::{ControllerMode, CycleController, PathSnapshot};
use figure8_kinematics::Twist;

/// Consumes the velocity and path topics and reports what is being
/// commanded once per second.
pub async fn run_telemetry(
    mut twist_rx: broadcast::Receiver<Arc<Twist>>,
    mut path_rx: broadcast::Receiver<Arc<PathSnapshot>>,
    controller: Arc<CycleController>,
) -> anyhow::Result<()> {
    info!("Telemetry task started.");
    let mut report = time::interval(Duration::from_secs(1));
    let mut last_twist: Option<Arc<Twist>> = None;
    let mut last_path: Option<Arc<PathSnapshot>> = None;
    let mut received: u64 = 0;
    let mut lagged: u64 = 0;

    loop {
        tokio::select! {
            result = twist_rx.recv() => match result {
                Ok(twist) => {
                    last_twist = Some(twist);
                    received += 1;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => lagged += n,
                Err(broadcast::error::RecvError::Closed) => {
                    warn!("Velocity topic closed.");
                    break;
                }
            },
            result = path_rx.recv() => match result {
                Ok(path) => last_path = Some(path),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Telemetry path receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    warn!("Path topic closed.");
                    break;
                }
            },
            _ = report.tick() => {
                if controller.mode() == ControllerMode::Stopped {
                    break;
                }
                if let Some(twist) = &last_twist {
                    let (cycle, points) = last_path.as_ref().map_or((0, 0), |p| (p.cycle, p.len()));
                    info!(vx = twist.vx, wz = twist.wz, cycle, points, received, lagged, "Commanded twist");
                }
            }
        }
    }

    info!(received, lagged, "Telemetry task finished.");
    Ok(())
}
