// ==============================================================================
// airborne.rs — GROUNDED / AIRBORNE STATE MACHINE
// ------------------------------------------------------------------------------
// Grounded -> Airborne: crest launch (big slope drop ahead at speed) or the
//                       manual jump; both clear on_ground, seed up_velocity and
//                       lift the car 0.2 off the surface.
// Airborne -> Grounded: the car's Y has come down to (or through) the sampled
//                       ground height. Landing after more than 0.2 s in the
//                       air is a hard landing (impact cue).
//
// While airborne:
// - Y drops by gravity * dt (constant rate, not accelerated)
// - after 0.3 s the nose dips: direction.y -= time_in_air * 0.005 while it is
//   still above -0.5; direction is renormalised and up re-derived from it
// - time_in_air accumulates; up_velocity decays by 100/s (kept as state only,
//   it does not move the car)
// ==============================================================================

use serde::{Deserialize, Serialize};

use crate::dynamics::types::{Pos3, Vec3, safe_normalize};

pub const GRAVITY: f32 = 9.81;
pub const HARD_LANDING_AIR_TIME: f32 = 0.2;
pub const NOSE_DIP_AIR_TIME: f32 = 0.3;
pub const NOSE_DIP_RATE: f32 = 0.005;
pub const NOSE_DIP_FLOOR: f32 = -0.5;
pub const UP_VELOCITY_DECAY: f32 = 100.0;

pub const CREST_SLOPE_DROP: f32 = 50.0;
pub const CREST_MIN_SPEED: f32 = 100.0;
pub const LAUNCH_UP_VELOCITY: f32 = -0.5;
pub const LAUNCH_LIFT: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AirState {
    pub on_ground: bool,
    pub time_in_air: f32,
    pub up_velocity: f32,
}

impl Default for AirState {
    fn default() -> Self {
        Self { on_ground: true, time_in_air: 0.0, up_velocity: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    Soft,
    Hard,
}

/// Sudden slope drop ahead while fast enough to leave the road.
pub fn crest_ahead(current_slope: f32, next_slope: f32, speed: f32) -> bool {
    current_slope - next_slope > CREST_SLOPE_DROP && speed > CREST_MIN_SPEED
}

impl AirState {
    pub fn launch(&mut self, position: &mut Pos3) {
        self.on_ground = false;
        self.up_velocity = LAUNCH_UP_VELOCITY;
        position.y += LAUNCH_LIFT;
    }

    /// One airborne step. No-op while grounded. Returns the landing kind on the
    /// tick the car touches down.
    pub fn apply_gravity(
        &mut self,
        position: &mut Pos3,
        direction: &mut Vec3,
        up: &mut Vec3,
        ground_height: f32,
        elapsed: f32,
    ) -> Option<Landing> {
        if self.on_ground {
            return None;
        }

        self.on_ground = position.y <= ground_height;

        let mut landing = None;
        if self.on_ground {
            landing = Some(if self.time_in_air > HARD_LANDING_AIR_TIME {
                Landing::Hard
            } else {
                Landing::Soft
            });
            self.time_in_air = 0.0;
        } else {
            position.y -= GRAVITY * elapsed;

            if self.time_in_air > NOSE_DIP_AIR_TIME && direction.y > NOSE_DIP_FLOOR {
                direction.y -= self.time_in_air * NOSE_DIP_RATE;
            }
            let old_dir = *direction;
            *direction = safe_normalize(*direction, old_dir);
            realign_up(direction, up);

            self.time_in_air += elapsed;
            self.up_velocity -= elapsed * UP_VELOCITY_DECAY;
        }

        landing
    }
}

/// Re-derive `up` so that direction = up x right, right = direction x up.
pub fn realign_up(direction: &Vec3, up: &mut Vec3) {
    let right = direction.cross(up);
    let n = right.norm();
    if n <= 1e-6 {
        return;
    }
    *up = safe_normalize((right / n).cross(direction), *up);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::prelude::{Point, Vector};

    const DT: f32 = 1.0 / 60.0;

    fn frame() -> (Pos3, Vec3, Vec3) {
        (Point::new(0.0, 10.0, 0.0), Vector::new(0.0, 0.0, -1.0), Vector::new(0.0, 1.0, 0.0))
    }

    #[test]
    fn grounded_is_untouched() {
        let mut air = AirState::default();
        let (mut p, mut d, mut u) = frame();
        assert_eq!(air.apply_gravity(&mut p, &mut d, &mut u, 0.0, DT), None);
        assert_eq!(p.y, 10.0);
    }

    #[test]
    fn falls_at_constant_rate() {
        let mut air = AirState::default();
        let (mut p, mut d, mut u) = frame();
        air.launch(&mut p);
        assert!((p.y - 10.2).abs() < 1e-5);
        assert_eq!(air.up_velocity, LAUNCH_UP_VELOCITY);

        air.apply_gravity(&mut p, &mut d, &mut u, 0.0, 0.1);
        assert!((p.y - (10.2 - 0.981)).abs() < 1e-4);
        assert!((air.time_in_air - 0.1).abs() < 1e-6);
        assert!((air.up_velocity - (-0.5 - 10.0)).abs() < 1e-4);
    }

    #[test]
    fn hard_landing_after_long_flight() {
        let mut air = AirState::default();
        let (mut p, mut d, mut u) = frame();
        air.launch(&mut p);

        let mut landings = Vec::new();
        for _ in 0..200 {
            if let Some(l) = air.apply_gravity(&mut p, &mut d, &mut u, 0.0, DT) {
                landings.push(l);
            }
        }
        assert_eq!(landings, vec![Landing::Hard]);
        assert!(air.on_ground);
        assert_eq!(air.time_in_air, 0.0);
    }

    #[test]
    fn short_hop_is_soft() {
        let mut air = AirState::default();
        let (mut p, mut d, mut u) = frame();
        p.y = 0.0;
        air.launch(&mut p);

        let mut landing = None;
        for _ in 0..10 {
            if let Some(l) = air.apply_gravity(&mut p, &mut d, &mut u, 0.0, DT) {
                landing = Some(l);
                break;
            }
        }
        assert_eq!(landing, Some(Landing::Soft));
    }

    #[test]
    fn nose_dips_but_frame_stays_orthonormal() {
        let mut air = AirState::default();
        let (mut p, mut d, mut u) = frame();
        p.y = 1000.0;
        air.launch(&mut p);

        for _ in 0..600 {
            air.apply_gravity(&mut p, &mut d, &mut u, 0.0, DT);
            assert!((d.norm() - 1.0).abs() < 1e-4);
            assert!((u.norm() - 1.0).abs() < 1e-4);
            assert!(d.dot(&u).abs() < 1e-4);
        }
        assert!(d.y < 0.0);
        assert!(d.y > -0.6);
    }

    #[test]
    fn crest_needs_drop_and_speed() {
        assert!(crest_ahead(60.0, 0.0, 120.0));
        assert!(!crest_ahead(60.0, 0.0, 90.0));
        assert!(!crest_ahead(40.0, 0.0, 120.0));
    }
}
