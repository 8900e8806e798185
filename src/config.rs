// src/config.rs

use serde::Deserialize;
use std::{env, f32::consts::PI, fs};
use thiserror::Error;

/// Widest usable beam separation for the two-beam wall estimate.
const THETA_MAX: f32 = 70.0 * PI / 180.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f32 },
    #[error("theta must be inside (0 rad, 70 deg), got {value}")]
    ThetaOutOfRange { value: f32 },
}

/// Node parameters loaded from TOML file
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    // Vehicle physical parameters
    pub width: f32,
    pub wheelbase: f32,
    pub base_link_offset: f32,
    // Safety parameters
    pub ttc_threshold: f32,
    pub scan_timeout_secs: f32,
    // Wall follow parameters
    pub theta: f32,
    pub desired_distance: f32,
    pub lookahead_dist: f32,
    // Control parameters
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub integral_limit: f32,
    pub max_steering_rad: f32,
    pub update_rate: f32,
    // Node wiring
    pub mux_idx: usize,
    pub drive_topic: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: 0.2032,
            wheelbase: 0.3302,
            base_link_offset: 0.275,
            ttc_threshold: 0.01,
            scan_timeout_secs: 10.0,
            theta: PI / 4.0,
            desired_distance: 1.0,
            lookahead_dist: 1.0,
            kp: 1.0,
            ki: 0.001,
            kd: 0.05,
            integral_limit: 1.0,
            max_steering_rad: 0.4189,
            update_rate: 60.0,
            mux_idx: 1,
            drive_topic: "/drive".to_string(),
        }
    }
}

impl Config {
    /// Load parameters from the TOML file named by `CONFIG_PATH`,
    /// falling back to `./reactive_param.toml`.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            env::var("CONFIG_PATH").unwrap_or_else(|_| "./reactive_param.toml".to_string());
        let config_str = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        let config: Config = toml::from_str(&config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("width", self.width),
            ("wheelbase", self.wheelbase),
            ("base_link_offset", self.base_link_offset),
            ("ttc_threshold", self.ttc_threshold),
            ("scan_timeout_secs", self.scan_timeout_secs),
            ("desired_distance", self.desired_distance),
            ("lookahead_dist", self.lookahead_dist),
            ("integral_limit", self.integral_limit),
            ("max_steering_rad", self.max_steering_rad),
            ("update_rate", self.update_rate),
        ];
        for (name, value) in positive {
            if value <= 0.0 {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        if self.theta <= 0.0 || self.theta >= THETA_MAX {
            return Err(ConfigError::ThetaOutOfRange { value: self.theta });
        }
        Ok(())
    }
}
