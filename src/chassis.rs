// ==============================================================================
// chassis.rs — RENDER TRANSFORM + SHADOW CORNERS
// ------------------------------------------------------------------------------
// Stateless given the vehicle's pose:
//
//   M = T(position) * O * Rz(-roll * 0.21) * Rx(pitch / 60)
//
// O maps the model basis onto the car frame: +X -> right (direction x up),
// +Y -> up, -Z -> direction. Pitch / roll come from the suspension springs.
// ==============================================================================

use rapier3d::na::{Matrix3, Matrix4, Rotation3, Vector3};
use rapier3d::prelude::Real;

use crate::dynamics::types::{Pos3, Vec3};
use crate::dynamics::wheel::Wheel;

pub const PITCH_DIVISOR: f32 = 60.0;
pub const ROLL_SCALE: f32 = -0.21;

const SHADOW_X_OFFSET: f32 = 0.1;
const SHADOW_FRONT_Z: f32 = -2.0;
const SHADOW_REAR_Z: f32 = 3.5;

pub fn chassis_transform(position: &Pos3, direction: &Vec3, up: &Vec3, pitch: f32, roll: f32) -> Matrix4<Real> {
    let right = direction.cross(up);
    let orientation = Matrix3::from_columns(&[right, *up, -direction]).to_homogeneous();

    let roll = Rotation3::from_axis_angle(&Vector3::z_axis(), roll * ROLL_SCALE).to_homogeneous();
    let pitch = Rotation3::from_axis_angle(&Vector3::x_axis(), pitch / PITCH_DIVISOR).to_homogeneous();

    Matrix4::new_translation(&position.coords) * orientation * roll * pitch
}

/// Ground-contact quad under the car, FL FR RL RR. While airborne the corners
/// are pinned to the ground height below.
pub fn shadow_corners(wheels: &[Wheel; 4], chassis: &Matrix4<Real>, on_ground: bool, ground_height: f32) -> [Pos3; 4] {
    let y = -wheels[0].size / 2.0;
    let local = [
        Vector3::new(-SHADOW_X_OFFSET, y, SHADOW_FRONT_Z),
        Vector3::new(SHADOW_X_OFFSET, y, SHADOW_FRONT_Z),
        Vector3::new(-SHADOW_X_OFFSET, y, SHADOW_REAR_Z),
        Vector3::new(SHADOW_X_OFFSET, y, SHADOW_REAR_Z),
    ];

    let mut corners = [Pos3::origin(); 4];
    for (i, (wheel, extra)) in wheels.iter().zip(local).enumerate() {
        let mut p = wheel.offset_position(chassis, extra);
        if !on_ground {
            p.y = ground_height;
        }
        corners[i] = p;
    }
    corners
}
