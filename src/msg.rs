// src/msg.rs
//
// Message types exchanged with the collaborator-owned transport layer.
// These carry the same fields the vehicle stack puts on the wire
// (laser scan, odometry twist, ackermann drive command).

/// One revolution of the planar range scanner.
#[derive(Debug, Clone)]
pub struct ScanFrame {
    pub ranges: Vec<f32>,
    pub angle_min: f32,
    pub angle_max: f32,
    pub angle_increment: f32,
    /// Acquisition time in seconds.
    pub stamp: f64,
}

impl ScanFrame {
    /// Angle of beam `idx`, counter-clockwise from the forward axis.
    pub fn beam_angle(&self, idx: usize) -> f32 {
        self.angle_min + idx as f32 * self.angle_increment
    }
}

/// Latest forward speed sample. Signed, forward-positive.
#[derive(Debug, Clone, Copy, Default)]
pub struct Odometry {
    pub speed: f32,
    pub stamp: f64,
}

/// Steering + speed command for the drive sink.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveCommand {
    pub steering_angle: f32,
    pub speed: f32,
}

impl DriveCommand {
    /// Zero-speed, zero-steering command issued while braking.
    pub fn stop() -> Self {
        Self::default()
    }
}

/// Output of the collision monitor when a beam violates the TTC threshold.
#[derive(Debug, Clone, Copy)]
pub struct BrakeDecision {
    pub engage: bool,
    pub command: DriveCommand,
}
