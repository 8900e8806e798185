// src/safety.rs

use crate::lidar::valid_range;
use crate::msg::{BrakeDecision, DriveCommand, ScanFrame};
use crate::perimeter::CarPerimeter;
use log::warn;

/// Emergency-braking monitor: estimates time-to-collision per beam against
/// the precomputed body silhouette and decides whether to slam the brake.
pub struct CollisionMonitor {
    perimeter: CarPerimeter,
    ttc_threshold: f32,
}

impl CollisionMonitor {
    pub fn new(perimeter: CarPerimeter, ttc_threshold: f32) -> Self {
        Self {
            perimeter,
            ttc_threshold,
        }
    }

    /// Check one frame against the latest speed sample. Returns the brake
    /// decision as soon as any beam violates the TTC threshold.
    ///
    /// A frame whose length disagrees with the perimeter table is dropped,
    /// not fatal: the next frame supersedes it anyway.
    pub fn process(&self, frame: &ScanFrame, speed: f32) -> Option<BrakeDecision> {
        if frame.ranges.len() != self.perimeter.len() {
            warn!(
                "scan size {} does not match precomputed perimeter size {}, dropping frame",
                frame.ranges.len(),
                self.perimeter.len()
            );
            return None;
        }

        for (i, &range) in frame.ranges.iter().enumerate() {
            if !valid_range(range) {
                continue;
            }
            let closing_velocity = speed * frame.beam_angle(i).cos();
            if closing_velocity <= 0.0 {
                // Receding or parallel, no contact along this ray.
                continue;
            }
            let ttc = (range - self.perimeter.distance(i)) / closing_velocity;
            if ttc < self.ttc_threshold {
                return Some(BrakeDecision {
                    engage: true,
                    command: DriveCommand::stop(),
                });
            }
        }
        None
    }
}
