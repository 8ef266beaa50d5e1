use macroquad::prelude::*;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use figure8_cycle::{ControllerMode, CycleController, PathSnapshot};

use crate::blackboard::{Blackboard, snapshot};
use crate::frame::StaticTransform;

// Function to configure the macroquad window
pub fn window_conf() -> Conf {
    Conf {
        window_title: "figure8 trajectory".to_string(),
        window_width: 800,
        window_height: 600,
        high_dpi: true,
        ..Default::default()
    }
}

// Long paths are thinned out so a frame never draws more than this many segments.
const MAX_DRAWN_SEGMENTS: usize = 2000;
const ROBOT_SIZE: f32 = 15.0;
const FRAME_AXIS_LENGTH: f32 = 0.5; // meters

pub async fn run_visualization_loop(
    mut path_rx: broadcast::Receiver<Arc<PathSnapshot>>,
    bb: Blackboard,
    frame_rx: watch::Receiver<Option<StaticTransform>>,
    controller: Arc<CycleController>,
    scale: f32,
) {
    let mut current_path: Arc<PathSnapshot> = Arc::new(PathSnapshot::default());

    info!("Visualization loop starting inside graphics module...");

    loop {
        // Only the newest snapshot matters; lag just means we skip ahead.
        loop {
            match path_rx.try_recv() {
                Ok(path) => current_path = path,
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(broadcast::error::TryRecvError::Closed) => {
                    error!("Visualization path channel closed. Exiting visualization loop.");
                    return;
                }
            }
        }

        if controller.mode() == ControllerMode::Stopped {
            info!("Controller stopped. Exiting visualization loop.");
            break;
        }
        handle_keys(&controller);

        let state = snapshot(&bb);
        let center_x = screen_width() / 2.0;
        let center_y = screen_height() / 2.0;
        let to_screen = |x: f64, y: f64| vec2(center_x + x as f32 * scale, center_y - y as f32 * scale);

        clear_background(LIGHTGRAY);

        if let Some(transform) = frame_rx.borrow().as_ref() {
            let yaw = transform.rotation.yaw() as f32;
            let origin = to_screen(transform.translation[0], transform.translation[1]);
            let tip = origin + vec2(yaw.cos(), -yaw.sin()) * FRAME_AXIS_LENGTH * scale;
            draw_line(origin.x, origin.y, tip.x, tip.y, 2.0, DARKGREEN);
        }

        let stride = (current_path.len() / MAX_DRAWN_SEGMENTS).max(1);
        let mut previous: Option<Vec2> = None;
        for point in current_path.points().step_by(stride).chain(current_path.last()) {
            let p = to_screen(point.x, point.y);
            if let Some(prev) = previous {
                draw_line(prev.x, prev.y, p.x, p.y, 2.0, RED);
            }
            previous = Some(p);
        }

        if let Some(sample) = state.last_sample {
            let robot = to_screen(sample.x, sample.y);
            let heading = -sample.theta as f32;
            let corner = |offset: f32| robot + vec2((heading + offset).cos(), (heading + offset).sin()) * ROBOT_SIZE;
            let p1 = corner(0.0);
            let p2 = corner(2.0 * std::f32::consts::PI / 3.0);
            let p3 = corner(-2.0 * std::f32::consts::PI / 3.0);
            draw_triangle(p1, p2, p3, BLUE);
            draw_line(robot.x, robot.y, p1.x, p1.y, 2.0, DARKBLUE);

            draw_text(
                &format!("t={:.2} s  v={:.3} m/s  w={:.3} rad/s", sample.t, sample.v, sample.omega),
                10.0,
                20.0,
                20.0,
                BLACK,
            );
        }

        draw_text(
            &format!("cycle={}  points={}  mode={}", state.cycle_count, current_path.len(), state.mode),
            10.0,
            40.0,
            20.0,
            BLACK,
        );
        if !state.faults.is_empty() {
            draw_text(&format!("faults: {}", state.faults.join(", ")), 10.0, 60.0, 20.0, RED);
        }
        draw_text("[space] pause/resume  [q] stop", 10.0, screen_height() - 10.0, 18.0, DARKGRAY);

        next_frame().await
    }
}

fn handle_keys(controller: &CycleController) {
    let result = if is_key_pressed(KeyCode::Space) {
        match controller.mode() {
            ControllerMode::Running => controller.pause(),
            _ => controller.resume(),
        }
    } else if is_key_pressed(KeyCode::Q) || is_key_pressed(KeyCode::Escape) {
        controller.stop()
    } else {
        Ok(())
    };
    if let Err(e) = result {
        warn!(error = %e, "Key command rejected");
    }
}
