// src/node.rs
//
// Channel wiring for the two control loops. Each node is one task: a scan
// frame is processed to completion before the next is accepted, and the
// scan channel is drained to the newest frame first so a slow cycle never
// builds a backlog. Speed and mode flags arrive as watch snapshots read
// once per cycle.

use crate::config::Config;
use crate::control::{ActuationGate, PidController, SteeringController};
use crate::lidar::{BeamIndices, BeamOutOfFov, LidarGeometry};
use crate::msg::{DriveCommand, Odometry, ScanFrame};
use crate::perimeter::{CarGeometry, CarPerimeter};
use crate::safety::CollisionMonitor;
use crate::wall::WallEstimator;
use log::{debug, info};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no scan frame arrived within {waited_secs} s, cannot resolve scanner intrinsics")]
    ScanTimeout { waited_secs: f32 },
    #[error("scan stream closed before the first frame")]
    ScanStreamClosed,
    #[error(transparent)]
    BeamOutOfFov(#[from] BeamOutOfFov),
}

/// Block for the first scan frame, which fixes the scanner intrinsics for
/// the process lifetime. Startup precondition: expiry is fatal, there is
/// no degraded mode without the intrinsics.
pub async fn wait_for_first_scan(
    scan_rx: &mut mpsc::Receiver<ScanFrame>,
    wait: Duration,
) -> Result<ScanFrame, StartupError> {
    match timeout(wait, scan_rx.recv()).await {
        Ok(Some(frame)) => Ok(frame),
        Ok(None) => Err(StartupError::ScanStreamClosed),
        Err(_) => Err(StartupError::ScanTimeout {
            waited_secs: wait.as_secs_f32(),
        }),
    }
}

fn log_intrinsics(lidar: &LidarGeometry) {
    info!("min angle:  {:.4}", lidar.angle_min);
    info!("max angle:  {:.4}", lidar.angle_max);
    info!("scan incr:  {:.6}", lidar.angle_increment);
    info!("num beams:  {}", lidar.num_beams);
}

/// Emergency-braking loop: every frame is checked against the latest
/// speed sample; an engaged decision goes to both brake sinks. Runs
/// regardless of the actuation gate.
pub struct SafetyNode {
    scan_rx: mpsc::Receiver<ScanFrame>,
    odom_rx: watch::Receiver<Odometry>,
    brake_tx: mpsc::Sender<bool>,
    brake_drive_tx: mpsc::Sender<DriveCommand>,
    monitor: CollisionMonitor,
}

impl SafetyNode {
    pub async fn new(
        config: &Config,
        mut scan_rx: mpsc::Receiver<ScanFrame>,
        odom_rx: watch::Receiver<Odometry>,
        brake_tx: mpsc::Sender<bool>,
        brake_drive_tx: mpsc::Sender<DriveCommand>,
    ) -> Result<Self, StartupError> {
        let first = wait_for_first_scan(
            &mut scan_rx,
            Duration::from_secs_f32(config.scan_timeout_secs),
        )
        .await?;
        let lidar = LidarGeometry::from_frame(&first);
        log_intrinsics(&lidar);

        let car = CarGeometry {
            width: config.width,
            wheelbase: config.wheelbase,
            base_link_offset: config.base_link_offset,
        };
        let perimeter = CarPerimeter::compute(&car, &lidar);
        let monitor = CollisionMonitor::new(perimeter, config.ttc_threshold);

        Ok(Self {
            scan_rx,
            odom_rx,
            brake_tx,
            brake_drive_tx,
            monitor,
        })
    }

    pub async fn run(mut self) {
        while let Some(mut frame) = self.scan_rx.recv().await {
            // Skip old frames and process only the latest.
            while let Ok(newer) = self.scan_rx.try_recv() {
                frame = newer;
            }

            let speed = self.odom_rx.borrow().speed;
            if let Some(decision) = self.monitor.process(&frame, speed) {
                debug!("brake engaged at speed {:.2}", speed);
                if self.brake_tx.send(decision.engage).await.is_err() {
                    break;
                }
                if self.brake_drive_tx.send(decision.command).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Wall-following loop: two-beam wall estimate -> PID on the projected
/// distance error -> steering plus scheduled speed, forwarded only while
/// the actuation gate is enabled.
pub struct WallFollowNode {
    scan_rx: mpsc::Receiver<ScanFrame>,
    mux_rx: watch::Receiver<Vec<bool>>,
    drive_tx: mpsc::Sender<DriveCommand>,
    estimator: WallEstimator,
    controller: SteeringController,
    gate: ActuationGate,
    desired_distance: f32,
    prev_stamp: Option<f64>,
}

impl WallFollowNode {
    pub async fn new(
        config: &Config,
        mut scan_rx: mpsc::Receiver<ScanFrame>,
        mux_rx: watch::Receiver<Vec<bool>>,
        drive_tx: mpsc::Sender<DriveCommand>,
    ) -> Result<Self, StartupError> {
        let first = wait_for_first_scan(
            &mut scan_rx,
            Duration::from_secs_f32(config.scan_timeout_secs),
        )
        .await?;
        let lidar = LidarGeometry::from_frame(&first);
        log_intrinsics(&lidar);

        let beams = BeamIndices::resolve(&lidar, config.theta)?;
        info!("angle difference: {:.4}", beams.theta);

        let estimator = WallEstimator::new(beams, config.lookahead_dist);
        let pid = PidController::new(
            config.kp,
            config.ki,
            config.kd,
            config.integral_limit,
            config.update_rate,
        );
        let controller = SteeringController::new(pid, config.max_steering_rad);

        Ok(Self {
            scan_rx,
            mux_rx,
            drive_tx,
            estimator,
            controller,
            gate: ActuationGate::new(config.mux_idx),
            desired_distance: config.desired_distance,
            prev_stamp: None,
        })
    }

    pub async fn run(mut self) {
        while let Some(mut frame) = self.scan_rx.recv().await {
            while let Ok(newer) = self.scan_rx.try_recv() {
                frame = newer;
            }

            let flags = self.mux_rx.borrow().clone();
            self.gate.observe(&flags);

            // Either beam invalid: hold PID state, emit nothing. The next
            // frame supersedes this cycle anyway.
            let Some(measurement) = self.estimator.estimate(&frame) else {
                continue;
            };

            let dt = self
                .prev_stamp
                .map(|prev| (frame.stamp - prev) as f32)
                .unwrap_or(0.0);
            self.prev_stamp = Some(frame.stamp);

            let error = self.desired_distance - measurement.dist_ahead;
            let command = self.controller.update(error, dt);
            debug!(
                "dist {:.3} alpha {:.3} -> steer {:.3} speed {:.2}",
                measurement.dist, measurement.alpha, command.steering_angle, command.speed
            );

            if self.gate.enabled() && self.drive_tx.send(command).await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn test_config() -> Config {
        Config {
            scan_timeout_secs: 0.2,
            ..Config::default()
        }
    }

    fn corridor_frame(stamp: f64) -> ScanFrame {
        let angle_min = -3.0 * PI / 4.0;
        let angle_max = 3.0 * PI / 4.0;
        let increment = (angle_max - angle_min) / 1079.5;
        let ranges = (0..1080)
            .map(|i| {
                let angle = angle_min + i as f32 * increment;
                let s = angle.sin();
                if s.abs() > 1e-3 {
                    (1.0 / s).abs()
                } else {
                    f32::INFINITY
                }
            })
            .collect();
        ScanFrame {
            ranges,
            angle_min,
            angle_max,
            angle_increment: increment,
            stamp,
        }
    }

    /// Head-on wall right past the bumper (default car: front overhang
    /// is wheelbase - base_link_offset ~= 0.055 m), every beam valid.
    fn braking_frame() -> ScanFrame {
        ScanFrame {
            ranges: vec![0.06; 21],
            angle_min: -0.1,
            angle_max: 0.1,
            angle_increment: 0.2 / 20.5,
            stamp: 0.0,
        }
    }

    #[tokio::test]
    async fn startup_times_out_without_scan() {
        let (_scan_tx, scan_rx) = mpsc::channel::<ScanFrame>(4);
        let (_odom_tx, odom_rx) = watch::channel(Odometry::default());
        let (brake_tx, _brake_rx) = mpsc::channel(4);
        let (brake_drive_tx, _brake_drive_rx) = mpsc::channel(4);

        let result =
            SafetyNode::new(&test_config(), scan_rx, odom_rx, brake_tx, brake_drive_tx).await;
        assert!(matches!(result, Err(StartupError::ScanTimeout { .. })));
    }

    #[tokio::test]
    async fn startup_fails_on_closed_stream() {
        let (scan_tx, scan_rx) = mpsc::channel::<ScanFrame>(4);
        drop(scan_tx);
        let (_odom_tx, odom_rx) = watch::channel(Odometry::default());
        let (brake_tx, _brake_rx) = mpsc::channel(4);
        let (brake_drive_tx, _brake_drive_rx) = mpsc::channel(4);

        let result =
            SafetyNode::new(&test_config(), scan_rx, odom_rx, brake_tx, brake_drive_tx).await;
        assert!(matches!(result, Err(StartupError::ScanStreamClosed)));
    }

    #[tokio::test]
    async fn safety_node_brakes_independent_of_gate() {
        let (scan_tx, scan_rx) = mpsc::channel(8);
        let (odom_tx, odom_rx) = watch::channel(Odometry::default());
        let (brake_tx, mut brake_rx) = mpsc::channel(8);
        let (brake_drive_tx, mut brake_drive_rx) = mpsc::channel(8);

        scan_tx.send(braking_frame()).await.unwrap();
        let node = SafetyNode::new(&test_config(), scan_rx, odom_rx, brake_tx, brake_drive_tx)
            .await
            .unwrap();
        let handle = tokio::spawn(node.run());

        odom_tx.send(Odometry { speed: 2.0, stamp: 0.0 }).unwrap();
        scan_tx.send(braking_frame()).await.unwrap();
        drop(scan_tx);
        handle.await.unwrap();

        assert_eq!(brake_rx.recv().await, Some(true));
        assert_eq!(brake_drive_rx.recv().await, Some(DriveCommand::stop()));
    }

    #[tokio::test]
    async fn disabled_gate_blocks_every_drive_command() {
        let (scan_tx, scan_rx) = mpsc::channel(8);
        let (_mux_tx, mux_rx) = watch::channel(vec![false; 4]);
        let (drive_tx, mut drive_rx) = mpsc::channel(8);

        scan_tx.send(corridor_frame(0.0)).await.unwrap();
        let node = WallFollowNode::new(&test_config(), scan_rx, mux_rx, drive_tx)
            .await
            .unwrap();
        let handle = tokio::spawn(node.run());

        for i in 1..6 {
            scan_tx.send(corridor_frame(i as f64 * 0.025)).await.unwrap();
        }
        drop(scan_tx);
        handle.await.unwrap();

        assert!(drive_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn enabled_gate_forwards_drive_commands() {
        let config = test_config();
        let (scan_tx, scan_rx) = mpsc::channel(8);
        let mut flags = vec![false; 4];
        flags[config.mux_idx] = true;
        let (_mux_tx, mux_rx) = watch::channel(flags);
        let (drive_tx, mut drive_rx) = mpsc::channel(8);

        scan_tx.send(corridor_frame(0.0)).await.unwrap();
        let node = WallFollowNode::new(&config, scan_rx, mux_rx, drive_tx)
            .await
            .unwrap();
        let handle = tokio::spawn(node.run());

        scan_tx.send(corridor_frame(0.025)).await.unwrap();
        drop(scan_tx);
        handle.await.unwrap();

        let command = drive_rx.recv().await.expect("gate is enabled");
        assert!(command.speed > 0.0);
        assert!(command.steering_angle.abs() <= config.max_steering_rad);
    }

    #[tokio::test]
    async fn invalid_wall_beams_skip_the_cycle() {
        let config = test_config();
        let (scan_tx, scan_rx) = mpsc::channel(8);
        let mut flags = vec![false; 4];
        flags[config.mux_idx] = true;
        let (_mux_tx, mux_rx) = watch::channel(flags);
        let (drive_tx, mut drive_rx) = mpsc::channel(8);

        scan_tx.send(corridor_frame(0.0)).await.unwrap();
        let node = WallFollowNode::new(&config, scan_rx, mux_rx, drive_tx)
            .await
            .unwrap();
        let handle = tokio::spawn(node.run());

        let mut bad = corridor_frame(0.025);
        for range in bad.ranges.iter_mut() {
            *range = f32::NAN;
        }
        scan_tx.send(bad).await.unwrap();
        drop(scan_tx);
        handle.await.unwrap();

        assert!(drive_rx.recv().await.is_none());
    }
}
