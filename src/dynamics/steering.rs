// ==============================================================================
// steering.rs — STEERING WHEEL + SLIP (ARCADE YAW AUTHORITY)
// ==============================================================================
// Responsibilities:
// - Move the steering wheel toward the controller's turn input at a fixed rate,
//   clamped to the lock; relax it back to centre when the input is neutral
// - Turn the steering wheel into a per-tick yaw delta around the car's up
// - Consume pending post-collision rotation at a capped rate
// - Derive the slip factor and scale yaw authority by (1 - slip)
// - Decide skid cues (hard braking, or high slip with a lot of lock)
// ------------------------------------------------------------------------------
//
//   rotation = steering_wheel * 0.05          (negated when moving forward)
//   |speed| <  1        -> rotation = 0
//   |speed| <  20       -> rotation *= 0.06 * |speed|
//   otherwise           -> slip = min(mass * |speed| * 2e-6 (*1.2 braking), 0.91)
//                          rotation *= 1 - slip
//
// The post-collision path replaces the slip path for the tick it runs in.
// ==============================================================================

pub const STEERING_SPEED: f32 = 2.4;         // lock units / second
pub const STEERING_DEADBAND: f32 = 0.05;
pub const ROTATION_PER_LOCK: f32 = 0.05;
pub const LOW_SPEED_CUTOFF: f32 = 1.0;
pub const SLIP_SPEED: f32 = 20.0;
pub const LOW_SPEED_RAMP: f32 = 0.06;
pub const SLIP_PER_MASS_SPEED: f32 = 2.0e-6;
pub const BRAKING_SLIP_GAIN: f32 = 1.2;
pub const MAX_SLIP: f32 = 0.91;

const HARD_BRAKE: f32 = 0.5;
const HARD_BRAKE_MIN_SPEED: f32 = 5.0;
const SKID_LOCK: f32 = 0.25;
const SKID_SLIP: f32 = 0.43;

/// Move the steering wheel toward `turn` (-1..1) at `rate` lock units per
/// second. Neutral input relaxes toward zero and snaps inside the deadband.
pub fn update_steering_wheel(current: f32, turn: f32, max_lock: f32, rate: f32, elapsed: f32) -> f32 {
    let step = rate * elapsed;

    let next = if turn < 0.0 {
        (current + step * turn).max(-max_lock)
    } else if turn > 0.0 {
        (current + step * turn).min(max_lock)
    } else if current > STEERING_DEADBAND {
        current - step
    } else if current < -STEERING_DEADBAND {
        current + step
    } else {
        0.0
    };

    // a lock change mid-race must not leave the wheel outside the new range
    next.clamp(-max_lock, max_lock)
}

#[derive(Debug, Clone, Copy)]
pub struct SteeringInput {
    pub steering_wheel: f32,
    pub speed: f32,
    pub mass: f32,
    pub brake: f32,
    pub on_ground: bool,
    pub collision_rotation: f32, // pending, signed
    pub max_rotation_per_sec: f32,
    pub elapsed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringOutcome {
    pub rotation_change: f32,
    /// `None` when the collision path ran; slip keeps its previous value.
    pub slip_factor: Option<f32>,
    pub collision_rotation: f32, // what is left for the next tick
    pub skid_sound: bool,
    pub skid_all_wheels: bool,
}

pub fn slip_factor(mass: f32, speed: f32, braking: bool) -> f32 {
    let mut slip = mass * speed.abs() * SLIP_PER_MASS_SPEED;
    if braking {
        slip *= BRAKING_SLIP_GAIN;
    }
    slip.clamp(0.0, MAX_SLIP)
}

pub fn solve_steering(input: &SteeringInput) -> SteeringOutcome {
    let mut rotation = input.steering_wheel * ROTATION_PER_LOCK;
    if input.speed > 0.0 {
        rotation = -rotation;
    }

    // ------------------------------------------------------------
    // Post-collision spin: eat at most max_rot per tick
    // ------------------------------------------------------------
    if input.collision_rotation != 0.0 {
        let max_rot = input.max_rotation_per_sec * input.elapsed;
        let pending = input.collision_rotation;

        let (applied, left) = if pending > max_rot {
            (max_rot, pending - max_rot)
        } else if pending < -max_rot {
            (-max_rot, pending + max_rot)
        } else {
            (pending, 0.0)
        };

        return SteeringOutcome {
            rotation_change: rotation + applied,
            slip_factor: None,
            collision_rotation: left,
            skid_sound: true,
            skid_all_wheels: false,
        };
    }

    // ------------------------------------------------------------
    // Speed-dependent yaw authority
    // ------------------------------------------------------------
    let speed = input.speed.abs();
    let mut slip = 0.0;

    if speed < LOW_SPEED_CUTOFF {
        rotation = 0.0;
    } else if speed < SLIP_SPEED {
        rotation *= LOW_SPEED_RAMP * speed;
    } else if rotation != 0.0 {
        slip = slip_factor(input.mass, speed, input.brake > 0.0);
        rotation *= 1.0 - slip;
    }

    let hard_braking = input.on_ground && input.brake > HARD_BRAKE && speed > HARD_BRAKE_MIN_SPEED;
    let sliding = input.on_ground && input.steering_wheel.abs() > SKID_LOCK && slip > SKID_SLIP;

    if !input.on_ground {
        rotation = 0.0;
    }

    SteeringOutcome {
        rotation_change: rotation,
        slip_factor: Some(slip),
        collision_rotation: 0.0,
        skid_sound: hard_braking || sliding,
        skid_all_wheels: hard_braking,
    }
}
