// src/control.rs

use crate::msg::DriveCommand;
use std::f32::consts::PI;

// Speed lookup table: |steering| in degrees -> commanded speed.
// Sharper turns get less speed.
const SPEED_TABLE: [(f32, f32); 4] = [(5.0, 1.5), (10.0, 1.2), (20.0, 0.8), (f32::MAX, 0.5)];

/// Discrete PID over the wall-distance error. The integral term is clamped
/// so a long approach cannot wind it up past `integral_limit`.
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    integral: f32,
    prev_error: f32,
    integral_limit: f32,
    nominal_dt: f32,
}

impl PidController {
    pub fn new(kp: f32, ki: f32, kd: f32, integral_limit: f32, update_rate: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral: 0.0,
            prev_error: 0.0,
            integral_limit,
            nominal_dt: 1.0 / update_rate,
        }
    }

    /// One control step. `dt` is the time since the previous step; a
    /// non-positive value (first cycle, stalled clock) falls back to the
    /// nominal cycle period.
    pub fn update(&mut self, error: f32, dt: f32) -> f32 {
        let dt = if dt > 0.0 { dt } else { self.nominal_dt };

        self.integral =
            (self.integral + error * dt).clamp(-self.integral_limit, self.integral_limit);
        let derivative = (error - self.prev_error) / dt;
        self.prev_error = error;

        self.kp * error + self.ki * self.integral + self.kd * derivative
    }
}

/// Maps the wall-distance error to a clamped steering angle plus a
/// scheduled speed. Positive error (inside the desired band of the
/// followed left wall) steers right, away from the wall.
pub struct SteeringController {
    pid: PidController,
    max_steering_rad: f32,
}

impl SteeringController {
    pub fn new(pid: PidController, max_steering_rad: f32) -> Self {
        Self {
            pid,
            max_steering_rad,
        }
    }

    pub fn update(&mut self, error: f32, dt: f32) -> DriveCommand {
        let output = self.pid.update(error, dt);
        let steering_angle = (-output).clamp(-self.max_steering_rad, self.max_steering_rad);
        DriveCommand {
            steering_angle,
            speed: scheduled_speed(steering_angle),
        }
    }
}

/// Speed scheduled inversely to the commanded steering magnitude.
pub fn scheduled_speed(steering_angle: f32) -> f32 {
    let steer_deg = steering_angle.abs() * 180.0 / PI;
    SPEED_TABLE
        .iter()
        .find(|(angle, _)| steer_deg < *angle)
        .map(|(_, speed)| *speed)
        .unwrap_or(0.5)
}

/// Single boolean capability gating whether steering commands reach the
/// actuation sink. Fed by the externally-owned mode array; only the
/// configured slot matters here. The brake path never goes through this.
#[derive(Debug, Clone)]
pub struct ActuationGate {
    watch_idx: usize,
    enabled: bool,
}

impl ActuationGate {
    /// Starts disabled until the first mode update arrives.
    pub fn new(watch_idx: usize) -> Self {
        Self {
            watch_idx,
            enabled: false,
        }
    }

    pub fn observe(&mut self, flags: &[bool]) {
        self.enabled = flags.get(self.watch_idx).copied().unwrap_or(false);
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
}
