// ==============================================================================
// drag.rs — AIR / GROUND FRICTION + EXPLICIT GROUND DRAG
// ==============================================================================
// Two separate mechanisms slow the car down:
//
// 1) Exponential-decay approximation on the accumulated force and on speed:
//
//      friction = ground (14 on the road, 0 in the air)
//               + air    (0.07 * |speed|, capped at 7)
//      force *= 1 - friction * 0.06   * dt
//      speed *= 1 - friction * 0.0015 * dt
//
// 2) Grounded drag applied as a direct speed decrement toward zero:
//
//      drag = 6000 * brake / (2 * speed)       (only for |speed| >= 1)
//           + |steering_wheel| * 10
//           + 5 per off-road wheel             (only above |speed| 30)
//           + motor friction * 0.5
//
//    Floored at zero, forced to zero below |speed| 1, never crosses zero.
// ==============================================================================

pub const CAR_FRICTION_ON_ROAD: f32 = 14.0;
pub const AIR_FRICTION_PER_SPEED: f32 = 0.07;
pub const MAX_AIR_FRICTION: f32 = AIR_FRICTION_PER_SPEED * 100.0;
pub const FORCE_FRICTION_SCALE: f32 = 0.06;
pub const SPEED_FRICTION_SCALE: f32 = 0.0015;

const BRAKE_DRAG: f32 = 6000.0;
const STEER_DRAG: f32 = 10.0;
const OFF_ROAD_DRAG_PER_WHEEL: f32 = 5.0;
const OFF_ROAD_DRAG_MIN_SPEED: f32 = 30.0;
const MOTOR_FRICTION_SHARE: f32 = 0.5;
const FULL_STOP_SPEED: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Friction {
    pub ground: f32,
    pub air: f32,
}

impl Friction {
    pub fn total(&self) -> f32 {
        self.ground + self.air
    }

    /// Multiplier for the accumulated force this tick.
    pub fn force_damping(&self, elapsed: f32) -> f32 {
        1.0 - self.total() * FORCE_FRICTION_SCALE * elapsed
    }

    /// Multiplier for speed this tick.
    pub fn speed_damping(&self, elapsed: f32) -> f32 {
        1.0 - self.total() * SPEED_FRICTION_SCALE * elapsed
    }
}

pub fn friction(speed: f32, on_ground: bool) -> Friction {
    Friction {
        ground: if on_ground { CAR_FRICTION_ON_ROAD } else { 0.0 },
        air: (AIR_FRICTION_PER_SPEED * speed.abs()).min(MAX_AIR_FRICTION),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DragInput {
    pub speed: f32,
    pub brake: f32,
    pub steering_wheel: f32,
    pub wheels_off_road: u8,
    pub motor_friction: f32,
}

/// Explicit grounded drag (units of speed per second).
pub fn ground_drag(input: &DragInput) -> f32 {
    let speed = input.speed.abs();
    if speed < FULL_STOP_SPEED {
        return 0.0;
    }

    // |speed| >= 1 here, so the denominator is at least 2 in magnitude
    let mut drag = BRAKE_DRAG * input.brake / (input.speed * 2.0);
    drag += input.steering_wheel.abs() * STEER_DRAG;
    if speed > OFF_ROAD_DRAG_MIN_SPEED {
        drag += f32::from(input.wheels_off_road) * OFF_ROAD_DRAG_PER_WHEEL;
    }
    drag += input.motor_friction * MOTOR_FRICTION_SHARE;

    drag.max(0.0)
}

/// Apply drag toward zero without crossing it.
pub fn apply_drag(speed: f32, drag: f32, elapsed: f32) -> f32 {
    let dv = drag * elapsed;
    if speed > 0.0 {
        (speed - dv).max(0.0)
    } else if speed < 0.0 {
        (speed + dv).min(0.0)
    } else {
        0.0
    }
}
