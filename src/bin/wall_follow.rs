// src/bin/wall_follow.rs
//
// Wall-following PID loop wired to a scripted corridor feed. The vehicle
// starts inside the desired band with a small yaw error; the feed holds
// the pose so the emitted commands show the controller's correction. The
// actuation mux starts disabled and is enabled after one second to show
// the gate letting commands through.

use anyhow::{Context, Result};
use log::info;
use reactive_ws::node::WallFollowNode;
use reactive_ws::{Config, ScanFrame};
use std::f32::consts::PI;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

const FEED_RATE_HZ: f64 = 40.0;
const LEFT_WALL_DIST: f32 = 0.7;
const YAW_ERROR: f32 = 0.08;

/// 1080-beam frame for a straight wall on the left at perpendicular
/// distance `dist`, seen by a vehicle yawed `yaw` away from it.
fn left_wall_frame(dist: f32, yaw: f32, stamp: f64) -> ScanFrame {
    let angle_min = -3.0 * PI / 4.0;
    let angle_max = 3.0 * PI / 4.0;
    let angle_increment = (angle_max - angle_min) / 1079.5;
    let ranges = (0..1080)
        .map(|i| {
            let angle = angle_min + i as f32 * angle_increment - yaw;
            if angle.sin() > 1e-3 {
                dist / angle.sin()
            } else {
                f32::INFINITY
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

async fn feed_scans(
    scan_tx: mpsc::Sender<ScanFrame>,
    mux_tx: watch::Sender<Vec<bool>>,
    mux_idx: usize,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let dt = 1.0 / FEED_RATE_HZ;
    let mut interval = tokio::time::interval(Duration::from_secs_f64(dt));
    let mut stamp = 0.0;
    let mut tick = 0u64;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown_rx.changed() => break,
        }

        stamp += dt;
        tick += 1;
        if tick == FEED_RATE_HZ as u64 {
            info!("enabling wall-follow actuation");
            let mut flags = vec![false; 4];
            flags[mux_idx] = true;
            let _ = mux_tx.send(flags);
        }

        let frame = left_wall_frame(LEFT_WALL_DIST, YAW_ERROR, stamp);
        if scan_tx.send(frame).await.is_err() {
            break;
        }
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Wall follow node");

    let config = Config::load().context("loading node parameters")?;
    info!("drive sink: {}", config.drive_topic);

    let (scan_tx, scan_rx) = mpsc::channel(8);
    let (mux_tx, mux_rx) = watch::channel(vec![false; 4]);
    let (drive_tx, mut drive_rx) = mpsc::channel(8);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(true);
    })
    .context("installing ctrl-c handler")?;

    let feeder = tokio::spawn(feed_scans(scan_tx, mux_tx, config.mux_idx, shutdown_rx));

    let node = WallFollowNode::new(&config, scan_rx, mux_rx, drive_tx)
        .await
        .context("wall follow startup")?;
    let node_handle = tokio::spawn(node.run());

    // Drive sink: a real stack forwards these to the vehicle.
    let drive_logger = tokio::spawn(async move {
        let mut count = 0u64;
        while let Some(command) = drive_rx.recv().await {
            count += 1;
            if count % 40 == 1 {
                info!(
                    "drive: steering {:.3} rad, speed {:.2} m/s",
                    command.steering_angle, command.speed
                );
            }
        }
    });

    feeder.await?;
    node_handle.await?;
    drive_logger.await?;
    Ok(())
}
