//! Operator control: pause/resume/stop typed on stdin, Ctrl-C as shutdown.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use figure8_cycle::{Clock, ControlError, CycleController};
use figure8_kinematics::ParametricCurve;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Pause,
    Resume,
    Status,
    Stop,
}

impl FromStr for OperatorCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pause" | "p" => Ok(OperatorCommand::Pause),
            "resume" | "r" => Ok(OperatorCommand::Resume),
            "status" | "s" => Ok(OperatorCommand::Status),
            "stop" | "quit" | "q" => Ok(OperatorCommand::Stop),
            other => Err(anyhow!("unknown command `{}` (expected pause, resume, status or stop)", other)),
        }
    }
}

pub fn apply<K: ParametricCurve, C: Clock>(
    controller: &CycleController<K, C>,
    cmd: OperatorCommand,
) -> Result<(), ControlError> {
    match cmd {
        OperatorCommand::Pause => controller.pause(),
        OperatorCommand::Resume => controller.resume(),
        OperatorCommand::Stop => controller.stop(),
        OperatorCommand::Status => {
            let state = controller.cycle_state();
            info!(
                mode = %controller.mode(),
                elapsed = state.elapsed,
                pause_offset = state.pause_offset,
                cycle = state.cycle_count,
                path_points = controller.path_len(),
                "Status"
            );
            Ok(())
        }
    }
}

/// Reads commands line by line until `stop` or end of input.
pub async fn operator_loop(controller: Arc<CycleController>) -> anyhow::Result<()> {
    info!("Operator commands: pause | resume | status | stop");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read operator input")? {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<OperatorCommand>() {
            Ok(cmd) => {
                if let Err(e) = apply(controller.as_ref(), cmd) {
                    warn!(command = ?cmd, error = %e, "Operator command rejected");
                }
                if cmd == OperatorCommand::Stop {
                    break;
                }
            }
            Err(e) => warn!(error = %e, "Ignoring operator input"),
        }
    }
    debug!("Operator input closed.");
    Ok(())
}

pub async fn shutdown_on_ctrl_c(controller: Arc<CycleController>) -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    info!("Ctrl-C received, stopping.");
    if let Err(e) = controller.stop() {
        debug!(error = %e, "Controller was already stopped");
    }
    Ok(())
}
