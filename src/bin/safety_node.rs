// src/bin/safety_node.rs
//
// Emergency-braking monitor wired to a scripted demo feed: the vehicle
// approaches a wall at constant speed until the TTC monitor trips, then
// the scene resets and the approach repeats. With a real sensor stack the
// feed tasks are replaced by the transport subscriptions.

use anyhow::{Context, Result};
use log::info;
use reactive_ws::node::SafetyNode;
use reactive_ws::{Config, Odometry, ScanFrame};
use std::f32::consts::PI;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

const FEED_RATE_HZ: f64 = 40.0;
const APPROACH_SPEED: f32 = 2.0;
const WALL_START_DIST: f32 = 8.0;

/// Forward fan of 1080 beams seeing a flat wall `dist` ahead.
fn wall_ahead_frame(dist: f32, stamp: f64) -> ScanFrame {
    let angle_min = -3.0 * PI / 4.0;
    let angle_max = 3.0 * PI / 4.0;
    let angle_increment = (angle_max - angle_min) / 1079.5;
    let ranges = (0..1080)
        .map(|i| {
            let angle = angle_min + i as f32 * angle_increment;
            if angle.cos() > 0.01 {
                dist / angle.cos()
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
    odom_tx: watch::Sender<Odometry>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let dt = 1.0 / FEED_RATE_HZ;
    let mut interval = tokio::time::interval(Duration::from_secs_f64(dt));
    let mut wall_dist = WALL_START_DIST;
    let mut stamp = 0.0;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown_rx.changed() => break,
        }

        stamp += dt;
        wall_dist -= APPROACH_SPEED * dt as f32;
        if wall_dist < 0.04 {
            info!("scene reset, wall back at {} m", WALL_START_DIST);
            wall_dist = WALL_START_DIST;
        }

        let _ = odom_tx.send(Odometry {
            speed: APPROACH_SPEED,
            stamp,
        });
        if scan_tx.send(wall_ahead_frame(wall_dist, stamp)).await.is_err() {
            break;
        }
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Safety node (emergency braking monitor)");

    let config = Config::load().context("loading node parameters")?;

    let (scan_tx, scan_rx) = mpsc::channel(8);
    let (odom_tx, odom_rx) = watch::channel(Odometry::default());
    let (brake_tx, mut brake_rx) = mpsc::channel::<bool>(8);
    let (brake_drive_tx, mut brake_drive_rx) = mpsc::channel(8);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(true);
    })
    .context("installing ctrl-c handler")?;

    let feeder = tokio::spawn(feed_scans(scan_tx, odom_tx, shutdown_rx));

    let node = SafetyNode::new(&config, scan_rx, odom_rx, brake_tx, brake_drive_tx)
        .await
        .context("safety node startup")?;
    let node_handle = tokio::spawn(node.run());

    // Brake sinks: a real stack forwards these to the actuators.
    let brake_logger = tokio::spawn(async move {
        while let Some(engaged) = brake_rx.recv().await {
            if engaged {
                info!("BRAKE engaged");
            }
        }
    });
    let brake_drive_logger = tokio::spawn(async move {
        while let Some(command) = brake_drive_rx.recv().await {
            info!(
                "brake drive: steering {:.2}, speed {:.2}",
                command.steering_angle, command.speed
            );
        }
    });

    feeder.await?;
    node_handle.await?;
    brake_logger.await?;
    brake_drive_logger.await?;
    Ok(())
}
