//! Core shared types for `dynamics` (engine-agnostic).
// dynamics/types.rs
use std::fmt;

use rapier3d::na::{Unit, UnitQuaternion};
use rapier3d::prelude::{Point, Real, Vector};
use serde::{Deserialize, Serialize};

pub type Vec3 = Vector<Real>;
pub type Pos3 = Point<Real>;

/// World up (+Y).
pub const WORLD_UP: [Real; 3] = [0.0, 1.0, 0.0];
/// Model forward is -Z; a node orientation of 0 degrees faces this way.
pub const WORLD_FORWARD: [Real; 3] = [0.0, 0.0, -1.0];

/// Milliseconds of frame time that make up one move-factor unit.
const MOVE_FACTOR_PERIOD_MS: f32 = 400.0;
const MOVE_FACTOR_MIN: f32 = 0.001;
const MOVE_FACTOR_MAX: f32 = 0.5;

// ----- tiny vec helpers -----
#[inline] pub fn v3(v: [Real; 3]) -> Vec3 { Vector::new(v[0], v[1], v[2]) }
#[inline] pub fn p3(v: [Real; 3]) -> Pos3 { Point::new(v[0], v[1], v[2]) }
#[inline] pub fn arr(v: &Vec3) -> [Real; 3] { [v.x, v.y, v.z] }
#[inline] pub fn parr(p: &Pos3) -> [Real; 3] { [p.x, p.y, p.z] }

#[inline]
pub fn safe_normalize(v: Vec3, fallback: Vec3) -> Vec3 {
    let n = v.norm();
    if n > 1e-6 { v / n } else { fallback }
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Per-tick normalised time scale: `elapsed * 1000 / 400`, kept inside
/// [0.001, 0.5] so frame spikes cannot blow up force and spring integration.
#[inline]
pub fn move_factor(elapsed: f32) -> f32 {
    (elapsed * 1000.0 / MOVE_FACTOR_PERIOD_MS).clamp(MOVE_FACTOR_MIN, MOVE_FACTOR_MAX)
}

/// Forward vector for a heading in degrees around world up.
pub fn forward_from_orientation(degrees: f32) -> Vec3 {
    let rot = UnitQuaternion::from_axis_angle(&Vector::y_axis(), degrees.to_radians());
    rot * v3(WORLD_FORWARD)
}

/// Rotate `v` around `axis` by `angle` radians.
pub fn rotate_around(v: &Vec3, axis: &Vec3, angle: f32) -> Vec3 {
    if angle == 0.0 {
        return *v;
    }
    let axis = Unit::new_normalize(*axis);
    UnitQuaternion::from_axis_angle(&axis, angle) * *v
}

// ============================================
// Controller input (sampled once per tick)
// ============================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerInput {
    pub turn: f32,        // -1..1
    pub accelerate: f32,  // 0..1
    pub brake: f32,       // 0..1
    pub reset: bool,      // put the car back on the current node
    pub jump: bool,       // manual crest launch
}

impl ControllerInput {
    pub fn clamped(&self) -> Self {
        let finite = |v: f32| if v.is_finite() { v } else { 0.0 };
        Self {
            turn: finite(self.turn).clamp(-1.0, 1.0),
            accelerate: finite(self.accelerate).clamp(0.0, 1.0),
            brake: finite(self.brake).clamp(0.0, 1.0),
            reset: self.reset,
            jump: self.jump,
        }
    }
}

// ============================================
// Wheel identification
// ============================================
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum WheelId { FL, FR, RL, RR }

impl WheelId {
    pub const ALL: [WheelId; 4] = [WheelId::FL, WheelId::FR, WheelId::RL, WheelId::RR];

    pub fn as_str(&self) -> &'static str {
        match self {
            WheelId::FL => "FL",
            WheelId::FR => "FR",
            WheelId::RL => "RL",
            WheelId::RR => "RR",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            WheelId::FL => 0,
            WheelId::FR => 1,
            WheelId::RL => 2,
            WheelId::RR => 3,
        }
    }

    pub fn is_front(&self) -> bool {
        matches!(self, WheelId::FL | WheelId::FR)
    }

    pub fn is_rear(&self) -> bool {
        matches!(self, WheelId::RL | WheelId::RR)
    }
}

impl fmt::Display for WheelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_factor_is_clamped() {
        assert!((move_factor(1.0 / 60.0) - 0.041_666).abs() < 1e-4);
        assert_eq!(move_factor(0.0), 0.001);
        assert_eq!(move_factor(2.0), 0.5);
    }

    #[test]
    fn orientation_zero_faces_negative_z() {
        let f = forward_from_orientation(0.0);
        assert!((f - v3(WORLD_FORWARD)).norm() < 1e-6);

        let f = forward_from_orientation(90.0);
        assert!((f - Vector::new(-1.0, 0.0, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn input_is_clamped_and_sanitised() {
        let raw = ControllerInput { turn: -3.0, accelerate: 2.0, brake: f32::NAN, ..Default::default() };
        let c = raw.clamped();
        assert_eq!(c.turn, -1.0);
        assert_eq!(c.accelerate, 1.0);
        assert_eq!(c.brake, 0.0);
    }

    #[test]
    fn wheel_ids_split_axles() {
        assert!(WheelId::FL.is_front() && WheelId::FR.is_front());
        assert!(WheelId::RL.is_rear() && WheelId::RR.is_rear());
        assert_eq!(WheelId::RR.to_string(), "RR");
        assert_eq!(WheelId::ALL.iter().map(|w| w.index()).sum::<usize>(), 6);
    }
}
