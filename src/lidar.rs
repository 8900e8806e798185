// src/lidar.rs

use crate::msg::ScanFrame;
use std::f32::consts::FRAC_PI_2;
use thiserror::Error;

/// Scanner intrinsics captured once from the first frame and treated as
/// immutable for the process lifetime.
#[derive(Debug, Clone, Copy)]
pub struct LidarGeometry {
    pub num_beams: usize,
    pub angle_min: f32,
    pub angle_max: f32,
    pub angle_increment: f32,
}

impl LidarGeometry {
    pub fn from_frame(frame: &ScanFrame) -> Self {
        let num_beams =
            ((frame.angle_max - frame.angle_min) / frame.angle_increment).ceil() as usize;
        Self {
            num_beams,
            angle_min: frame.angle_min,
            angle_max: frame.angle_max,
            angle_increment: frame.angle_increment,
        }
    }

    pub fn beam_angle(&self, idx: usize) -> f32 {
        self.angle_min + idx as f32 * self.angle_increment
    }
}

#[derive(Debug, Error)]
#[error("beam for angle {angle} rad falls outside the scanner field of view")]
pub struct BeamOutOfFov {
    pub angle: f32,
}

/// The two fixed beams the wall estimator triangulates from: `b_idx` points
/// orthogonally left of the heading, `a_idx` is offset forward of it by
/// `theta`.
#[derive(Debug, Clone, Copy)]
pub struct BeamIndices {
    pub a_idx: usize,
    pub b_idx: usize,
    /// Separation actually achieved after index rounding. Downstream math
    /// must use this, not the nominal angle.
    pub theta: f32,
}

impl BeamIndices {
    pub fn resolve(lidar: &LidarGeometry, theta: f32) -> Result<Self, BeamOutOfFov> {
        let b_idx = Self::index_for(lidar, FRAC_PI_2)?;
        let a_idx = Self::index_for(lidar, FRAC_PI_2 - theta)?;

        // Correct theta for the rounding error in the two indices.
        let theta = lidar.angle_increment * (b_idx as isize - a_idx as isize) as f32;
        Ok(Self { a_idx, b_idx, theta })
    }

    fn index_for(lidar: &LidarGeometry, angle: f32) -> Result<usize, BeamOutOfFov> {
        let idx = ((angle - lidar.angle_min) / lidar.angle_increment).round();
        if idx < 0.0 || idx as usize >= lidar.num_beams {
            return Err(BeamOutOfFov { angle });
        }
        Ok(idx as usize)
    }
}

/// A range reading is a usable obstacle measurement only if it is finite
/// and positive. Anything else means "no obstacle along this ray".
pub fn valid_range(range: f32) -> bool {
    range.is_finite() && range > 0.0
}

/// One beam reported by distance and angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointDist {
    pub distance: f32,
    pub angle: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanExtremes {
    pub closest: PointDist,
    pub farthest: PointDist,
}

/// Closest and farthest valid beams of a frame, or `None` when no beam
/// carries a usable reading.
pub fn scan_extremes(frame: &ScanFrame) -> Option<ScanExtremes> {
    let mut closest: Option<PointDist> = None;
    let mut farthest: Option<PointDist> = None;

    for (i, &range) in frame.ranges.iter().enumerate() {
        if !valid_range(range) {
            continue;
        }
        let point = PointDist {
            distance: range,
            angle: frame.beam_angle(i),
        };
        if closest.map_or(true, |p| range < p.distance) {
            closest = Some(point);
        }
        if farthest.map_or(true, |p| range > p.distance) {
            farthest = Some(point);
        }
    }

    Some(ScanExtremes {
        closest: closest?,
        farthest: farthest?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn frame(ranges: Vec<f32>) -> ScanFrame {
        let num = ranges.len();
        let angle_min = -3.0 * PI / 4.0;
        let angle_max = 3.0 * PI / 4.0;
        ScanFrame {
            ranges,
            angle_min,
            angle_max,
            // Ratio strictly between num-1 and num, like real drivers
            // report, so the ceil rule lands on num exactly.
            angle_increment: (angle_max - angle_min) / (num as f32 - 0.5),
            stamp: 0.0,
        }
    }

    #[test]
    fn num_beams_uses_ceil() {
        let f = ScanFrame {
            ranges: vec![1.0; 7],
            angle_min: 0.0,
            angle_max: 1.0,
            angle_increment: 0.15,
            stamp: 0.0,
        };
        // 1.0 / 0.15 = 6.67 -> 7 beams
        assert_eq!(LidarGeometry::from_frame(&f).num_beams, 7);
    }

    #[test]
    fn beam_indices_point_left_and_forward_of_left() {
        let f = frame(vec![1.0; 1080]);
        let lidar = LidarGeometry::from_frame(&f);
        let beams = BeamIndices::resolve(&lidar, PI / 4.0).unwrap();

        let b_angle = lidar.beam_angle(beams.b_idx);
        let a_angle = lidar.beam_angle(beams.a_idx);
        assert!((b_angle - FRAC_PI_2).abs() < lidar.angle_increment);
        assert!((a_angle - (FRAC_PI_2 - PI / 4.0)).abs() < lidar.angle_increment);
        assert!(beams.a_idx < beams.b_idx);
    }

    #[test]
    fn corrected_theta_matches_achieved_separation() {
        let f = frame(vec![1.0; 1080]);
        let lidar = LidarGeometry::from_frame(&f);
        let beams = BeamIndices::resolve(&lidar, PI / 4.0).unwrap();

        let achieved = lidar.beam_angle(beams.b_idx) - lidar.beam_angle(beams.a_idx);
        assert!(beams.theta > 0.0);
        assert!((beams.theta - achieved).abs() < 1e-6);
        // Corrected value stays within one increment of the request.
        assert!((beams.theta - PI / 4.0).abs() <= lidar.angle_increment);
    }

    #[test]
    fn narrow_fov_rejects_orthogonal_beam() {
        // Scanner that only covers +/- 30 degrees has no beam at +90.
        let f = ScanFrame {
            ranges: vec![1.0; 120],
            angle_min: -0.52,
            angle_max: 0.52,
            angle_increment: 1.04 / 119.5,
            stamp: 0.0,
        };
        let lidar = LidarGeometry::from_frame(&f);
        assert!(BeamIndices::resolve(&lidar, PI / 4.0).is_err());
    }

    #[test]
    fn invalid_readings_are_rejected() {
        assert!(valid_range(1.3));
        assert!(!valid_range(f32::INFINITY));
        assert!(!valid_range(f32::NEG_INFINITY));
        assert!(!valid_range(f32::NAN));
        assert!(!valid_range(0.0));
        assert!(!valid_range(-0.5));
    }

    #[test]
    fn extremes_skip_invalid_readings() {
        let mut ranges = vec![2.0; 8];
        ranges[0] = f32::INFINITY; // would win "farthest" if not filtered
        ranges[3] = f32::NAN;
        ranges[4] = -1.0; // would win "closest" if not filtered
        ranges[5] = 0.7;
        ranges[6] = 5.5;
        let f = frame(ranges);

        let extremes = scan_extremes(&f).unwrap();
        assert_eq!(extremes.closest.distance, 0.7);
        assert_eq!(extremes.farthest.distance, 5.5);
        assert!((extremes.closest.angle - f.beam_angle(5)).abs() < 1e-6);
    }

    #[test]
    fn all_invalid_frame_has_no_extremes() {
        let f = frame(vec![f32::INFINITY; 16]);
        assert!(scan_extremes(&f).is_none());
    }
}
