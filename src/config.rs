// ==============================================================================
// config.rs — VEHICLE TUNING PRESETS + SERVER SETTINGS
// ------------------------------------------------------------------------------
// VehicleConfig: per-car tuning (mass, steering lock, traction, wheel layout,
//                engine power). Presets are plain consts; a JSON file can
//                override any field (missing fields fall back to SEDAN).
// ServerConfig:  bind address, tick rate and the car to spawn, read from the
//                environment (RACER_BIND, RACER_TICK_HZ, RACER_VEHICLE,
//                RACER_VEHICLE_CONFIG).
// ==============================================================================

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};

use crate::dynamics::motor::EngineConfig;
use crate::dynamics::steering::STEERING_SPEED;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub mass: f32,                 // kg
    pub max_steering_lock: f32,    // steering wheel range, +-
    pub max_rotation_per_sec: f32, // post-collision spin rate cap
    pub traction: f32,
    pub steering_speed: f32,       // lock units / second
    pub max_power: f32,

    // --- Wheel layout (chassis-local, FL / RL; right side is mirrored) ---
    pub wheel_size: f32,
    pub front_wheel: [f32; 3],
    pub rear_wheel: [f32; 3],
}

pub const SEDAN: VehicleConfig = VehicleConfig {
    mass: 1500.0,
    max_steering_lock: 0.3,
    max_rotation_per_sec: 5.0,
    traction: 520.0,
    steering_speed: STEERING_SPEED,
    max_power: 1500.0,
    wheel_size: 1.2,
    front_wheel: [-1.5, 0.6, -2.4],
    rear_wheel: [-1.5, 0.6, 2.6],
};

pub const HEAVY: VehicleConfig = VehicleConfig {
    mass: 2400.0,
    max_steering_lock: 0.25,
    max_rotation_per_sec: 4.0,
    traction: 700.0,
    steering_speed: 2.0,
    max_power: 2300.0,
    wheel_size: 1.4,
    front_wheel: [-1.7, 0.7, -2.9],
    rear_wheel: [-1.7, 0.7, 3.1],
};

impl Default for VehicleConfig {
    fn default() -> Self {
        SEDAN
    }
}

impl VehicleConfig {
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sedan" => Some(SEDAN),
            "heavy" => Some(HEAVY),
            _ => None,
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("parsing vehicle config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading vehicle config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.mass > 0.0 && self.mass.is_finite(), "mass must be positive, got {}", self.mass);
        ensure!(self.max_steering_lock > 0.0, "max_steering_lock must be positive");
        ensure!(
            self.max_rotation_per_sec > 0.0 && self.max_rotation_per_sec.is_finite(),
            "max_rotation_per_sec must be positive, got {}",
            self.max_rotation_per_sec
        );
        ensure!(self.steering_speed > 0.0, "steering_speed must be positive");
        ensure!(self.max_power >= 0.0, "max_power must not be negative");
        ensure!(self.wheel_size > 0.0, "wheel_size must be positive");
        Ok(())
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig { max_power: self.max_power, ..EngineConfig::default() }
    }

    /// Mount offsets in FL, FR, RL, RR order.
    pub fn wheel_offsets(&self) -> [[f32; 3]; 4] {
        let [fx, fy, fz] = self.front_wheel;
        let [rx, ry, rz] = self.rear_wheel;
        [
            [fx, fy, fz],
            [-fx, fy, fz],
            [rx, ry, rz],
            [-rx, ry, rz],
        ]
    }
}

// ============================================
// Server
// ============================================
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: String,
    pub tick_hz: u32,
    pub vehicle: String,
    pub vehicle_config: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:9001".to_string(),
            tick_hz: 60,
            vehicle: "sedan".to_string(),
            vehicle_config: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(bind) = lookup("RACER_BIND") {
            cfg.bind = bind;
        }
        if let Some(hz) = lookup("RACER_TICK_HZ") {
            cfg.tick_hz = hz
                .trim()
                .parse()
                .with_context(|| format!("RACER_TICK_HZ is not a number: {hz:?}"))?;
            ensure!((1..=1000).contains(&cfg.tick_hz), "RACER_TICK_HZ out of range: {}", cfg.tick_hz);
        }
        if let Some(name) = lookup("RACER_VEHICLE") {
            cfg.vehicle = name;
        }
        cfg.vehicle_config = lookup("RACER_VEHICLE_CONFIG").map(PathBuf::from);

        Ok(cfg)
    }

    pub fn tick_seconds(&self) -> f32 {
        1.0 / self.tick_hz as f32
    }

    /// The file override wins over the named preset.
    pub fn vehicle_config(&self) -> Result<VehicleConfig> {
        if let Some(path) = &self.vehicle_config {
            return VehicleConfig::load(path);
        }
        match VehicleConfig::preset(&self.vehicle) {
            Some(cfg) => Ok(cfg),
            None => bail!("unknown vehicle preset '{}' (expected sedan or heavy)", self.vehicle),
        }
    }
}
