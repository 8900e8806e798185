// src/perimeter.rs

use crate::lidar::LidarGeometry;

/// Static vehicle body model: an axis-aligned rectangle around the scanner
/// origin. The scanner sits `base_link_offset` ahead of the rear axle, so
/// the body extends `wheelbase - base_link_offset` forward of it and
/// `base_link_offset` behind it, with `width / 2` to each side.
#[derive(Debug, Clone, Copy)]
pub struct CarGeometry {
    pub width: f32,
    pub wheelbase: f32,
    pub base_link_offset: f32,
}

impl CarGeometry {
    fn half_width(&self) -> f32 {
        self.width / 2.0
    }

    fn front_offset(&self) -> f32 {
        self.wheelbase - self.base_link_offset
    }

    fn rear_offset(&self) -> f32 {
        self.base_link_offset
    }
}

/// Quadrant of a beam angle, counter-clockwise positive from the forward
/// axis. Decides whether the axial projection runs against the front or
/// the rear edge of the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quadrant {
    FrontLeft,
    RearLeft,
    RearRight,
    FrontRight,
}

impl Quadrant {
    fn of(angle: f32) -> Self {
        if angle >= 0.0 {
            if angle.cos() >= 0.0 {
                Quadrant::FrontLeft
            } else {
                Quadrant::RearLeft
            }
        } else if angle.cos() >= 0.0 {
            Quadrant::FrontRight
        } else {
            Quadrant::RearRight
        }
    }

    fn axial_offset(self, car: &CarGeometry) -> f32 {
        match self {
            Quadrant::FrontLeft | Quadrant::FrontRight => car.front_offset(),
            Quadrant::RearLeft | Quadrant::RearRight => car.rear_offset(),
        }
    }
}

/// Distance from the scanner origin to the body edge along a ray at
/// `angle`: the nearer of the side-wall and front/back-wall projections.
pub fn edge_distance(car: &CarGeometry, angle: f32) -> f32 {
    let axial = Quadrant::of(angle).axial_offset(car) / angle.cos().abs();
    let lateral = car.half_width() / angle.sin().abs();
    axial.min(lateral)
}

/// Per-beam body-edge distances, the TTC baseline. Computed once at
/// startup; length always equals the scanner beam count.
#[derive(Debug, Clone)]
pub struct CarPerimeter {
    table: Vec<f32>,
}

impl CarPerimeter {
    pub fn compute(car: &CarGeometry, lidar: &LidarGeometry) -> Self {
        let table = (0..lidar.num_beams)
            .map(|i| edge_distance(car, lidar.beam_angle(i)))
            .collect();
        Self { table }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn distance(&self, idx: usize) -> f32 {
        self.table[idx]
    }
}
