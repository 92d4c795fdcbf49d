// ==============================================================================
// traction.rs — ENGINE FORCE -> SPEED (ACCUMULATED FORCE, F = m a)
// ------------------------------------------------------------------------------
// The motor's power output (x 0.4) is the acceleration force for the tick.
// Force is accumulated across ticks (and decays in drag.rs); each grounded tick
// the accumulated force is turned into a scalar speed gain projected on the
// car's forward direction:
//
//     dv    = force / mass
//     apply = min(dot(normalize(dv), direction), 1)
//     speed += |dv| * apply
//
// Wheel spin: traction availability = (traction + speed) / accel_force, capped
// at 1. Spinning when it drops below 1, or on a high-rpm low-speed launch.
// ==============================================================================

use crate::dynamics::types::Vec3;

pub const POWER_TO_FORCE: f32 = 0.4;
pub const REDLINE_FORCE_CUT: f32 = 0.2;
pub const STANDSTILL_SPEED: f32 = 1.0;

const LAUNCH_SPIN_RPM: f32 = 0.7;
const LAUNCH_SPIN_MAX_SPEED: f32 = 5.0;

/// Fraction of the acceleration force the tyres can take, in (-inf, 1].
pub fn traction_ratio(traction: f32, speed: f32, accel_force: f32) -> f32 {
    if accel_force <= 0.0 {
        return 1.0;
    }
    ((traction + speed) / accel_force).min(1.0)
}

pub fn wheels_spinning(ratio: f32, rpm: f32, speed: f32, throttle: f32) -> bool {
    ratio < 1.0 || (rpm > LAUNCH_SPIN_RPM && speed < LAUNCH_SPIN_MAX_SPEED && throttle > 0.0)
}

/// Scalar speed gain from the accumulated force, projected on `direction`.
pub fn speed_gain(force: &Vec3, mass: f32, direction: &Vec3) -> f32 {
    let dv = force / mass;
    let magnitude = dv.norm();
    if magnitude <= 0.0 || !magnitude.is_finite() {
        return 0.0;
    }
    let apply = (dv / magnitude).dot(direction).min(1.0);
    magnitude * apply
}
