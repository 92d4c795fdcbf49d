// ==============================================================================
// motor.rs — MOTOR SEAM + DEFAULT ENGINE / AUTOMATIC GEARBOX
// ==============================================================================
// The vehicle only talks to the `Motor` trait: it sets the throttle, reads back
// power output / rpm / redline / internal friction, flags wheel spin, and polls
// for gear changes once per tick.
//
// `Engine` is the stock implementation:
// - rpm is normalised (0..1, can overshoot past 1 when over-revved)
// - rpm follows max(idle, speed / gear top speed, launch free-rev)
// - power = throttle * max_power * gear torque multiplier * torque curve(rpm)
// - torque curve rises to a peak at 0.6 rpm and falls to zero at 1.0
// - automatic gearbox: upshift at 0.9, downshift below 0.35, the clutch is
//   out (no power) for `shift_time` seconds per change
// - engine braking (internal friction) proportional to rpm off-throttle
// ==============================================================================

use serde::{Deserialize, Serialize};

pub trait Motor: Send {
    fn set_throttle(&mut self, throttle: f32);
    fn throttle(&self) -> f32;

    /// Power for the current throttle / rpm / gear.
    fn power_output(&self) -> f32;
    /// Normalised 0..1 (may exceed 1 when over-revved).
    fn rpm(&self) -> f32;
    fn at_redline(&self) -> bool;
    /// Drag contribution of the drivetrain this tick.
    fn current_friction(&self) -> f32;

    fn wheels_spinning(&self) -> bool;
    fn set_wheels_spinning(&mut self, spinning: bool);

    fn gear_engaged(&self) -> bool;
    /// -1 reverse, 0 neutral, 1.. forward.
    fn current_gear(&self) -> i32;
    /// Gear selected since the last call, if any.
    fn take_gear_changed(&mut self) -> Option<i32>;

    fn update(&mut self, speed: f32, elapsed: f32);

    fn snapshot(&self) -> MotorState;
    fn restore(&mut self, state: &MotorState);
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotorState {
    pub throttle: f32,
    pub rpm: f32,
    pub gear: i32,
    pub gear_engaged: bool,
    pub shift_timer: f32,
    pub wheels_spinning: bool,
    pub pending_gear_change: Option<i32>,
}

// ============================================
// Engine config
// ============================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub max_power: f32,
    pub gear_top_speeds: Vec<f32>, // speed at rpm 1.0, per forward gear
    pub idle_rpm: f32,
    pub redline_rpm: f32,
    pub upshift_rpm: f32,
    pub downshift_rpm: f32,
    pub shift_time: f32,    // s
    pub launch_rpm: f32,    // free-rev at full throttle from standstill
    pub launch_speed: f32,  // clutch fully in above this speed
    pub rpm_response: f32,  // 1/s
    pub engine_brake: f32,  // friction per unit rpm off-throttle
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_power: 1500.0,
            gear_top_speeds: vec![45.0, 75.0, 105.0, 140.0, 180.0],
            idle_rpm: 0.12,
            redline_rpm: 0.97,
            upshift_rpm: 0.9,
            downshift_rpm: 0.35,
            shift_time: 0.15,
            launch_rpm: 0.85,
            launch_speed: 20.0,
            rpm_response: 6.0,
            engine_brake: 30.0,
        }
    }
}

/// Torque multiplier over normalised rpm: 0.6 at idle, 1.0 at 0.6, 0 at 1.0.
pub fn torque_curve(rpm: f32) -> f32 {
    const PEAK: f32 = 0.6;
    if rpm >= 1.0 {
        0.0
    } else if rpm < PEAK {
        0.6 + 0.4 * rpm.max(0.0) / PEAK
    } else {
        let t = (rpm - PEAK) / (1.0 - PEAK);
        1.0 - t * t
    }
}

// ============================================
// Gearbox
// ============================================
#[derive(Debug, Clone, PartialEq)]
pub struct Gearbox {
    pub gear: i32,
    pub engaged: bool,
    pub shift_timer: f32,
    top_speeds: Vec<f32>,
}

impl Gearbox {
    pub fn new(top_speeds: Vec<f32>) -> Self {
        Self {
            gear: if top_speeds.is_empty() { 0 } else { 1 },
            engaged: true,
            shift_timer: 0.0,
            top_speeds,
        }
    }

    pub fn gear_count(&self) -> i32 {
        self.top_speeds.len() as i32
    }

    /// Top speed of the current gear; reverse borrows first gear.
    pub fn top_speed(&self) -> Option<f32> {
        let idx = match self.gear {
            g if g > 0 => (g - 1) as usize,
            -1 => 0,
            _ => return None,
        };
        self.top_speeds.get(idx).copied()
    }

    /// Torque multiplication of the current gear; first gear is 1.0.
    pub fn torque_multiplier(&self) -> f32 {
        match (self.top_speeds.first(), self.top_speed()) {
            (Some(first), Some(top)) if top > 0.0 => first / top,
            _ => 0.0,
        }
    }

    pub fn select(&mut self, gear: i32, shift_time: f32) -> bool {
        let gear = gear.clamp(-1, self.gear_count());
        if gear == self.gear {
            return false;
        }
        self.gear = gear;
        self.engaged = shift_time <= 0.0;
        self.shift_timer = shift_time.max(0.0);
        true
    }

    pub fn tick(&mut self, elapsed: f32) {
        if self.engaged {
            return;
        }
        self.shift_timer -= elapsed;
        if self.shift_timer <= 0.0 {
            self.shift_timer = 0.0;
            self.engaged = true;
        }
    }
}

// ============================================
// Engine
// ============================================
#[derive(Debug, Clone)]
pub struct Engine {
    pub config: EngineConfig,
    pub gearbox: Gearbox,
    throttle: f32,
    rpm: f32,
    wheels_spinning: bool,
    gear_changed: Option<i32>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let gearbox = Gearbox::new(config.gear_top_speeds.clone());
        let rpm = config.idle_rpm;
        Self {
            config,
            gearbox,
            throttle: 0.0,
            rpm,
            wheels_spinning: false,
            gear_changed: None,
        }
    }

    fn shift(&mut self, gear: i32) {
        if self.gearbox.select(gear, self.config.shift_time) {
            self.gear_changed = Some(self.gearbox.gear);
        }
    }

    pub fn shift_up(&mut self) {
        if self.gearbox.gear < self.gearbox.gear_count() {
            self.shift(self.gearbox.gear + 1);
        }
    }

    pub fn shift_down(&mut self) {
        if self.gearbox.gear > 1 {
            self.shift(self.gearbox.gear - 1);
        }
    }

    pub fn select_reverse(&mut self) {
        self.shift(-1);
    }

    pub fn select_drive(&mut self) {
        self.shift(1);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Motor for Engine {
    fn set_throttle(&mut self, throttle: f32) {
        self.throttle = throttle.clamp(0.0, 1.0);
    }

    fn throttle(&self) -> f32 {
        self.throttle
    }

    fn power_output(&self) -> f32 {
        if !self.gearbox.engaged || self.gearbox.gear == 0 {
            return 0.0;
        }
        let sign = if self.gearbox.gear < 0 { -1.0 } else { 1.0 };
        sign * self.throttle
            * self.config.max_power
            * self.gearbox.torque_multiplier()
            * torque_curve(self.rpm)
    }

    fn rpm(&self) -> f32 {
        self.rpm
    }

    fn at_redline(&self) -> bool {
        self.rpm >= self.config.redline_rpm
    }

    fn current_friction(&self) -> f32 {
        if self.throttle > 0.01 || !self.gearbox.engaged {
            0.0
        } else {
            self.config.engine_brake * self.rpm
        }
    }

    fn wheels_spinning(&self) -> bool {
        self.wheels_spinning
    }

    fn set_wheels_spinning(&mut self, spinning: bool) {
        self.wheels_spinning = spinning;
    }

    fn gear_engaged(&self) -> bool {
        self.gearbox.engaged
    }

    fn current_gear(&self) -> i32 {
        self.gearbox.gear
    }

    fn take_gear_changed(&mut self) -> Option<i32> {
        self.gear_changed.take()
    }

    fn update(&mut self, speed: f32, elapsed: f32) {
        self.gearbox.tick(elapsed);

        let speed = speed.abs();
        let speed_rpm = match self.gearbox.top_speed() {
            Some(top) if top > 0.0 => speed / top,
            _ => 0.0,
        };

        let clutch = (1.0 - speed / self.config.launch_speed.max(1e-3)).max(0.0);
        let launch = self.throttle * self.config.launch_rpm * clutch;
        let target = self.config.idle_rpm.max(speed_rpm).max(launch);

        let blend = (self.config.rpm_response * elapsed).min(1.0);
        self.rpm += (target - self.rpm) * blend;

        // automatic box, forward gears only
        if self.gearbox.engaged && self.gearbox.gear > 0 {
            if speed_rpm >= self.config.upshift_rpm && self.gearbox.gear < self.gearbox.gear_count() {
                self.shift_up();
            } else if speed_rpm < self.config.downshift_rpm && self.gearbox.gear > 1 {
                self.shift_down();
            }
        }
    }

    fn snapshot(&self) -> MotorState {
        MotorState {
            throttle: self.throttle,
            rpm: self.rpm,
            gear: self.gearbox.gear,
            gear_engaged: self.gearbox.engaged,
            shift_timer: self.gearbox.shift_timer,
            wheels_spinning: self.wheels_spinning,
            pending_gear_change: self.gear_changed,
        }
    }

    fn restore(&mut self, state: &MotorState) {
        self.throttle = state.throttle;
        self.rpm = state.rpm;
        self.gearbox.gear = state.gear.clamp(-1, self.gearbox.gear_count());
        self.gearbox.engaged = state.gear_engaged;
        self.gearbox.shift_timer = state.shift_timer;
        self.wheels_spinning = state.wheels_spinning;
        self.gear_changed = state.pending_gear_change;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn torque_curve_shape() {
        assert!((torque_curve(0.0) - 0.6).abs() < 1e-6);
        assert!((torque_curve(0.6) - 1.0).abs() < 1e-6);
        assert!((torque_curve(0.8) - 0.75).abs() < 1e-5);
        assert_eq!(torque_curve(1.0), 0.0);
        assert_eq!(torque_curve(1.3), 0.0);
    }

    #[test]
    fn starts_in_first_gear_engaged() {
        let e = Engine::default();
        assert_eq!(e.current_gear(), 1);
        assert!(e.gear_engaged());
        assert_eq!(e.power_output(), 0.0); // no throttle yet
    }

    #[test]
    fn throttle_from_standstill_free_revs() {
        let mut e = Engine::default();
        e.set_throttle(1.0);
        for _ in 0..60 {
            e.update(0.0, DT);
        }
        assert!(e.rpm() > 0.7, "rpm={}", e.rpm());
        assert!(e.power_output() > 0.0);
    }

    #[test]
    fn upshift_is_reported_once_and_disengages_briefly() {
        let mut e = Engine::default();
        e.set_throttle(1.0);
        e.update(44.0, DT); // 44 / 45 > 0.9
        assert_eq!(e.current_gear(), 2);
        assert!(!e.gear_engaged());
        assert_eq!(e.power_output(), 0.0);
        assert_eq!(e.take_gear_changed(), Some(2));
        assert_eq!(e.take_gear_changed(), None);

        for _ in 0..12 {
            e.update(44.0, DT);
        }
        assert!(e.gear_engaged());
        assert_eq!(e.current_gear(), 2);
    }

    #[test]
    fn downshift_when_slow_in_high_gear() {
        let mut e = Engine::default();
        e.gearbox.select(4, 0.0);
        e.update(20.0, DT); // 20 / 140 < 0.35
        assert_eq!(e.current_gear(), 3);
    }

    #[test]
    fn redline_when_over_revved() {
        let mut e = Engine::default();
        e.set_throttle(1.0);
        e.gearbox.select(5, 0.0);
        for _ in 0..240 {
            e.update(179.0, DT);
        }
        assert!(e.at_redline());
        assert_eq!(e.current_gear(), 5);
    }

    #[test]
    fn engine_brake_only_off_throttle() {
        let mut e = Engine::default();
        e.set_throttle(0.0);
        assert!(e.current_friction() > 0.0);
        e.set_throttle(1.0);
        assert_eq!(e.current_friction(), 0.0);
    }

    #[test]
    fn reverse_produces_negative_power() {
        let mut e = Engine::default();
        e.select_reverse();
        assert_eq!(e.take_gear_changed(), Some(-1));
        e.set_throttle(1.0);
        for _ in 0..30 {
            e.update(0.0, DT);
        }
        assert!(e.power_output() < 0.0);

        e.select_drive();
        assert_eq!(e.take_gear_changed(), Some(1));
        assert_eq!(e.current_gear(), 1);
    }

    #[test]
    fn snapshot_restores_state() {
        let mut e = Engine::default();
        e.set_throttle(0.7);
        e.update(44.0, DT);
        let snap = e.snapshot();

        let mut other = Engine::default();
        other.restore(&snap);
        assert_eq!(other.snapshot(), snap);
        assert_eq!(other.power_output(), e.power_output());
    }
}
