// src/bin/corridor_sim.rs
//
// Closed-loop system test without hardware: a kinematic bicycle model
// drives a corridor with a dead end. The wall-follow node steers it along
// the left wall while the safety node watches the end wall; the run
// finishes when the TTC monitor slams the brake. Reports per-cycle
// latency and tracking-error statistics.

use anyhow::{Context, Result};
use log::{info, warn};
use rand::Rng;
use reactive_ws::node::{SafetyNode, WallFollowNode};
use reactive_ws::{Config, Odometry, ScanFrame};
use std::f32::consts::PI;
use std::time::Instant;
use tokio::sync::{mpsc, watch};

const SIM_DT: f64 = 0.025;
const MAX_STEPS: usize = 4000;
const CORRIDOR_WIDTH: f32 = 2.0;
const CORRIDOR_LENGTH: f32 = 14.0;
const RANGE_NOISE: f32 = 0.004;

/// Vehicle pose inside the corridor. `yaw` is positive when the nose
/// points away from the left wall, matching the wall estimator's alpha.
struct VehicleState {
    dist_left: f32,
    yaw: f32,
    x: f32,
    speed: f32,
}

#[derive(Debug, Default)]
struct RunningStats {
    avg_cycle_ms: f64,
    max_cycle_ms: f64,
    avg_tracking_err: f64,
    sample_count: u64,
}

impl RunningStats {
    fn update(&mut self, cycle_ms: f64, tracking_err: f64) {
        self.sample_count += 1;
        let alpha = 1.0 / self.sample_count as f64;
        self.avg_cycle_ms = (1.0 - alpha) * self.avg_cycle_ms + alpha * cycle_ms;
        self.avg_tracking_err = (1.0 - alpha) * self.avg_tracking_err + alpha * tracking_err;
        self.max_cycle_ms = self.max_cycle_ms.max(cycle_ms);
    }
}

/// Ranges against the left wall, right wall and end wall, from the
/// vehicle pose, with a little uniform sensor noise.
fn render_scan(state: &VehicleState, stamp: f64, rng: &mut impl Rng) -> ScanFrame {
    let angle_min = -3.0 * PI / 4.0;
    let angle_max = 3.0 * PI / 4.0;
    let angle_increment = (angle_max - angle_min) / 1079.5;

    let ranges = (0..1080)
        .map(|i| {
            let world = angle_min + i as f32 * angle_increment - state.yaw;
            let mut range = f32::INFINITY;
            if world.sin() > 1e-3 {
                range = range.min(state.dist_left / world.sin());
            }
            if world.sin() < -1e-3 {
                range = range.min((CORRIDOR_WIDTH - state.dist_left) / -world.sin());
            }
            if world.cos() > 1e-3 {
                range = range.min((CORRIDOR_LENGTH - state.x) / world.cos());
            }
            if range.is_finite() {
                range + rng.random_range(-RANGE_NOISE..RANGE_NOISE)
            } else {
                range
            }
        })
        .collect();

    ScanFrame {
        ranges,
        angle_min,
        angle_max,
        angle_increment,
        stamp,
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Corridor sim: wall follow + safety, closed loop");

    let config = Config::load().context("loading node parameters")?;
    let wheelbase = config.wheelbase;
    let desired = config.desired_distance;

    let (wall_scan_tx, wall_scan_rx) = mpsc::channel(8);
    let (safety_scan_tx, safety_scan_rx) = mpsc::channel(8);
    let (odom_tx, odom_rx) = watch::channel(Odometry::default());
    let mut flags = vec![false; 4];
    flags[config.mux_idx] = true;
    let (_mux_tx, mux_rx) = watch::channel(flags);
    let (drive_tx, mut drive_rx) = mpsc::channel(8);
    let (brake_tx, mut brake_rx) = mpsc::channel::<bool>(8);
    let (brake_drive_tx, mut brake_drive_rx) = mpsc::channel(8);

    let mut rng = rand::rng();
    let mut state = VehicleState {
        dist_left: 0.6,
        yaw: 0.1,
        x: 0.0,
        speed: 0.0,
    };
    let mut stamp = 0.0;

    // Both nodes resolve their intrinsics from the first rendered frame.
    let first = render_scan(&state, stamp, &mut rng);
    wall_scan_tx.send(first.clone()).await?;
    safety_scan_tx.send(first).await?;

    let wall_node = WallFollowNode::new(&config, wall_scan_rx, mux_rx, drive_tx)
        .await
        .context("wall follow startup")?;
    let safety_node = SafetyNode::new(&config, safety_scan_rx, odom_rx, brake_tx, brake_drive_tx)
        .await
        .context("safety node startup")?;
    let wall_handle = tokio::spawn(wall_node.run());
    let safety_handle = tokio::spawn(safety_node.run());

    let mut stats = RunningStats::default();
    let mut braked = false;

    for step in 0..MAX_STEPS {
        stamp += SIM_DT;
        let cycle_start = Instant::now();

        let frame = render_scan(&state, stamp, &mut rng);
        odom_tx.send(Odometry {
            speed: state.speed,
            stamp,
        })?;
        wall_scan_tx.send(frame.clone()).await?;
        safety_scan_tx.send(frame).await?;

        let Some(command) = drive_rx.recv().await else {
            break;
        };

        if matches!(brake_rx.try_recv(), Ok(true)) {
            let _ = brake_drive_rx.try_recv();
            info!(
                "brake engaged {:.2} m before the end wall after {} steps",
                CORRIDOR_LENGTH - state.x,
                step
            );
            state.speed = 0.0;
            braked = true;
            break;
        }

        // Kinematic bicycle step: positive steering turns the nose toward
        // the left wall, shrinking yaw.
        state.speed = command.speed;
        state.yaw -= (state.speed / wheelbase) * command.steering_angle.tan() * SIM_DT as f32;
        state.dist_left += state.speed * state.yaw.sin() * SIM_DT as f32;
        state.x += state.speed * state.yaw.cos() * SIM_DT as f32;

        if state.dist_left < 0.05 || state.dist_left > CORRIDOR_WIDTH - 0.05 {
            warn!("vehicle hit a corridor wall at x = {:.2}", state.x);
            break;
        }

        let cycle_ms = cycle_start.elapsed().as_secs_f64() * 1e3;
        stats.update(cycle_ms, (desired - state.dist_left).abs() as f64);

        if step % 40 == 0 {
            info!(
                "x {:6.2}  dist {:.3}  yaw {:+.3}  steer {:+.3}  speed {:.2}",
                state.x, state.dist_left, state.yaw, command.steering_angle, command.speed
            );
        }
    }

    if !braked {
        warn!("run ended without a brake event");
    }
    info!(
        "cycles {}  avg {:.3} ms  max {:.3} ms  avg tracking err {:.3} m",
        stats.sample_count, stats.avg_cycle_ms, stats.max_cycle_ms, stats.avg_tracking_err
    );

    drop(wall_scan_tx);
    drop(safety_scan_tx);
    wall_handle.await?;
    safety_handle.await?;
    Ok(())
}
