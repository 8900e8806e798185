// src/wall.rs

use crate::lidar::{valid_range, BeamIndices};
use crate::msg::ScanFrame;

/// Wall pose relative to the vehicle, from one scan frame.
#[derive(Debug, Clone, Copy)]
pub struct WallMeasurement {
    /// Heading error against the wall, zero when driving parallel.
    /// Positive means the nose points away from the followed wall.
    pub alpha: f32,
    /// Current perpendicular distance to the wall.
    pub dist: f32,
    /// Perpendicular distance projected one lookahead distance ahead.
    pub dist_ahead: f32,
}

/// Two-beam wall triangulation: one beam orthogonal to the heading, one
/// offset forward by the (rounding-corrected) separation angle. Avoids a
/// full wall-line regression.
pub struct WallEstimator {
    beams: BeamIndices,
    lookahead_dist: f32,
}

impl WallEstimator {
    pub fn new(beams: BeamIndices, lookahead_dist: f32) -> Self {
        Self {
            beams,
            lookahead_dist,
        }
    }

    /// `None` when either beam carries no usable reading; the caller skips
    /// that control cycle instead of feeding garbage into the PID.
    pub fn estimate(&self, frame: &ScanFrame) -> Option<WallMeasurement> {
        let a = *frame.ranges.get(self.beams.a_idx)?;
        let b = *frame.ranges.get(self.beams.b_idx)?;
        if !valid_range(a) || !valid_range(b) {
            return None;
        }

        let theta = self.beams.theta;
        let alpha = ((a * theta.cos() - b) / (a * theta.sin())).atan();
        let dist = b * alpha.cos();
        let dist_ahead = dist + self.lookahead_dist * alpha.sin();

        Some(WallMeasurement {
            alpha,
            dist,
            dist_ahead,
        })
    }
}
