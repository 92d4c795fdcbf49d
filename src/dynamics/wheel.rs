//! Wheel visual / contact proxy. Driven from vehicle speed and steering each
//! tick; carries no physics of its own.

use rapier3d::na::Matrix4;
use rapier3d::prelude::Real;
use serde::{Deserialize, Serialize};

use crate::dynamics::types::{Pos3, Vec3, WheelId, p3, v3};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wheel {
    pub id: WheelId,
    pub rotation: f32,     // radians, rolling angle
    pub steer_angle: f32,  // front wheels only
    pub is_skidding: bool,
    pub skid_time: f32,    // seconds skidding without a break
    pub size: f32,
    pub offset: [Real; 3], // chassis-local
}

impl Wheel {
    pub fn new(id: WheelId, size: f32, offset: [Real; 3]) -> Self {
        Self {
            id,
            rotation: 0.0,
            steer_angle: 0.0,
            is_skidding: false,
            skid_time: 0.0,
            size,
            offset,
        }
    }

    pub fn steer(&mut self, angle: f32) {
        self.steer_angle = angle;
    }

    /// Per-tick bookkeeping for skid-mark emitters.
    pub fn update(&mut self, elapsed: f32) {
        if self.is_skidding {
            self.skid_time += elapsed;
        } else {
            self.skid_time = 0.0;
        }
    }

    /// World position of a point given relative to this wheel's chassis mount.
    pub fn offset_position(&self, chassis: &Matrix4<Real>, extra: Vec3) -> Pos3 {
        chassis.transform_point(&(p3(self.offset) + extra))
    }

    pub fn world_position(&self, chassis: &Matrix4<Real>) -> Pos3 {
        self.offset_position(chassis, v3([0.0, 0.0, 0.0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::na::Vector3;

    #[test]
    fn skid_time_accumulates_and_resets() {
        let mut w = Wheel::new(WheelId::RL, 1.2, [-1.5, 0.6, 2.6]);
        w.is_skidding = true;
        w.update(0.1);
        w.update(0.1);
        assert!((w.skid_time - 0.2).abs() < 1e-6);
        w.is_skidding = false;
        w.update(0.1);
        assert_eq!(w.skid_time, 0.0);
    }

    #[test]
    fn offset_position_follows_chassis_translation() {
        let w = Wheel::new(WheelId::FL, 1.2, [-1.5, 0.6, -2.4]);
        let chassis = Matrix4::new_translation(&Vector3::new(10.0, 0.0, 5.0));
        let p = w.world_position(&chassis);
        assert!((p.x - 8.5).abs() < 1e-6);
        assert!((p.y - 0.6).abs() < 1e-6);
        assert!((p.z - 2.6).abs() < 1e-6);
    }
}
