// src/bin/point_dist.rs
//
// Closest/farthest-point reporter. The demo feed is a corridor with one
// obstacle circling the scanner so both extremes keep moving.

use anyhow::{Context, Result};
use log::info;
use reactive_ws::lidar::scan_extremes;
use reactive_ws::ScanFrame;
use std::f32::consts::PI;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

const FEED_RATE_HZ: f64 = 40.0;

fn corridor_frame_with_obstacle(obstacle_idx: usize, stamp: f64) -> ScanFrame {
    let angle_min = -3.0 * PI / 4.0;
    let angle_max = 3.0 * PI / 4.0;
    let angle_increment = (angle_max - angle_min) / 1079.5;
    let mut ranges: Vec<f32> = (0..1080)
        .map(|i| {
            let angle = angle_min + i as f32 * angle_increment;
            let s = angle.sin().abs();
            if s > 1e-3 {
                (1.2 / s).min(30.0)
            } else {
                30.0
            }
        })
        .collect();
    for offset in 0..20 {
        let idx = (obstacle_idx + offset) % ranges.len();
        ranges[idx] = 0.6;
    }
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
    info!("Point distance node");

    let (scan_tx, mut scan_rx) = mpsc::channel::<ScanFrame>(8);
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(true);
    })
    .context("installing ctrl-c handler")?;

    let feeder = tokio::spawn(async move {
        let dt = 1.0 / FEED_RATE_HZ;
        let mut interval = tokio::time::interval(Duration::from_secs_f64(dt));
        let mut stamp = 0.0;
        let mut obstacle_idx = 0usize;
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown_rx.changed() => break,
            }
            stamp += dt;
            obstacle_idx = (obstacle_idx + 3) % 1080;
            if scan_tx
                .send(corridor_frame_with_obstacle(obstacle_idx, stamp))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let reporter = tokio::spawn(async move {
        let mut count = 0u64;
        while let Some(mut frame) = scan_rx.recv().await {
            while let Ok(newer) = scan_rx.try_recv() {
                frame = newer;
            }
            let Some(extremes) = scan_extremes(&frame) else {
                continue;
            };
            count += 1;
            if count % 20 == 1 {
                info!(
                    "closest {:.2} m @ {:.2} rad, farthest {:.2} m @ {:.2} rad",
                    extremes.closest.distance,
                    extremes.closest.angle,
                    extremes.farthest.distance,
                    extremes.farthest.angle
                );
            }
        }
    });

    feeder.await?;
    reporter.await?;
    Ok(())
}
