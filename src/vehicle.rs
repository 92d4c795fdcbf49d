// ==============================================================================
// vehicle.rs — PER-TICK VEHICLE PIPELINE
// ------------------------------------------------------------------------------
// One `update` per simulation tick, strictly in this order (later stages read
// what earlier ones wrote):
//
//   1) bookkeeping: previous position, move-factor, skid flags cleared
//   2) reset request
//   3) steering + slip -> yaw the direction around up
//   4) engine force (motor, wheel spin, F = m a)
//   5) drag / friction (+ suspension springs while grounded)
//   6) position integration
//   7) track node walk
//   8) crest launch / jump
//   9) ground height + surface frame
//  10) wheel visuals
//  11) chassis transform
//  12) off-road + fence, then gravity / landing
//
// Any track or ground fault aborts the tick with an error.
// ==============================================================================

use anyhow::{Result, anyhow, ensure};
use rapier3d::na::Matrix4;
use rapier3d::prelude::{Real, Vector};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::chassis::{chassis_transform, shadow_corners};
use crate::collab::{FenceCollision, VehicleEvents};
use crate::config::VehicleConfig;
use crate::dynamics::airborne::{self, AirState, Landing};
use crate::dynamics::drag::{self, DragInput};
use crate::dynamics::motor::{Engine, Motor, MotorState};
use crate::dynamics::spring::Spring;
use crate::dynamics::steering::{self, SteeringInput};
use crate::dynamics::traction;
use crate::dynamics::types::{
    ControllerInput, Pos3, Vec3, WORLD_FORWARD, WORLD_UP, WheelId, arr, move_factor, p3, parr, rotate_around,
    safe_normalize, v3,
};
use crate::dynamics::wheel::Wheel;
use crate::track::{NodeStep, Track};

// Suspension (visual only)
const PITCH_STIFFNESS: f32 = 60.0;
const PITCH_DAMPING: f32 = 12.0;
const PITCH_LIMIT: f32 = 1.4;
const ROLL_STIFFNESS: f32 = 54.0;
const ROLL_DAMPING: f32 = 12.0;
const ROLL_LIMIT: f32 = 3.0;
const PITCH_PER_SPEED_CHANGE: f32 = 0.6;
const ROLL_PER_LOCK: f32 = -0.05;
const ROLL_FULL_SPEED: f32 = 30.0;

const REAR_SPIN_RATE: f32 = 50.0;
const OFF_ROAD_CUE_SPEED: f32 = 3.0;
const RESET_DROP_HEIGHT: f32 = 50.0;

pub struct Vehicle {
    pub config: VehicleConfig,

    pub position: Pos3,
    pub previous_position: Pos3,
    pub direction: Vec3,        // unit forward
    pub up: Vec3,               // unit, surface-aligned while grounded
    pub force: Vec3,            // accumulated engine force
    pub speed: f32,             // signed, along direction
    pub previous_speed: f32,

    pub steering_wheel: f32,    // +-max_steering_lock
    pub slip_factor: f32,       // 0..0.91
    pub rotation_change: f32,   // yaw applied this tick
    pub rotate_after_collision: f32, // pending spin from the fence

    pub air: AirState,
    pub wheels: [Wheel; 4],
    pub motor: Box<dyn Motor>,
    pub pitch: Spring,
    pub roll: Spring,

    pub track_id: Option<Uuid>,
    pub current_node: Option<usize>,
    pub track_height: f32,
    pub wheels_outside_road: u8,

    pub move_factor: f32,
    pub transform: Matrix4<Real>,
}

impl Vehicle {
    pub fn new(config: VehicleConfig) -> Self {
        let engine = Engine::new(config.engine());
        Self::with_motor(config, Box::new(engine))
    }

    pub fn with_motor(config: VehicleConfig, motor: Box<dyn Motor>) -> Self {
        let offsets = config.wheel_offsets();
        let wheels = WheelId::ALL.map(|id| Wheel::new(id, config.wheel_size, offsets[id.index()]));

        let mut vehicle = Self {
            config,
            position: Pos3::origin(),
            previous_position: Pos3::origin(),
            direction: v3(WORLD_FORWARD),
            up: v3(WORLD_UP),
            force: Vec3::zeros(),
            speed: 0.0,
            previous_speed: 0.0,
            steering_wheel: 0.0,
            slip_factor: 0.0,
            rotation_change: 0.0,
            rotate_after_collision: 0.0,
            air: AirState::default(),
            wheels,
            motor,
            pitch: Spring::new(PITCH_STIFFNESS, PITCH_DAMPING, 0.0, PITCH_LIMIT),
            roll: Spring::new(ROLL_STIFFNESS, ROLL_DAMPING, 0.0, ROLL_LIMIT),
            track_id: None,
            current_node: None,
            track_height: 0.0,
            wheels_outside_road: 0,
            move_factor: 0.0,
            transform: Matrix4::identity(),
        };
        vehicle.refresh_transform();
        vehicle
    }

    // --------------------------------------------
    // Frame helpers
    // --------------------------------------------
    pub fn right(&self) -> Vec3 {
        self.direction.cross(&self.up)
    }

    pub fn on_ground(&self) -> bool {
        self.air.on_ground
    }

    pub fn refresh_transform(&mut self) {
        self.transform =
            chassis_transform(&self.position, &self.direction, &self.up, self.pitch.position, self.roll.position);
    }

    pub fn shadow(&self) -> [Pos3; 4] {
        shadow_corners(&self.wheels, &self.transform, self.air.on_ground, self.track_height)
    }

    // --------------------------------------------
    // Track assignment / placement
    // --------------------------------------------

    /// Attach to `track`: speed and previous position are reset and the
    /// current node becomes the track's start node. Position is left as is.
    pub fn assign_track(&mut self, track: &Track) -> Result<()> {
        track.next_of(track.start)?;
        self.track_id = Some(track.id);
        self.previous_position = self.position;
        self.speed = 0.0;
        self.current_node = Some(track.start);
        Ok(())
    }

    /// Put the car on node `index`, grounded and facing along the track.
    pub fn place_at_node(&mut self, track: &Track, index: usize) -> Result<()> {
        self.ensure_track(track)?;
        let node = track.node(index)?;

        self.position = node.position;
        self.previous_position = node.position;
        self.up = node.up;
        let right = node.forward().cross(&node.up);
        self.direction = safe_normalize(node.up.cross(&right), node.forward());
        self.current_node = Some(index);
        self.track_height = node.position.y;
        self.air = AirState::default();
        self.refresh_transform();
        Ok(())
    }

    /// Drop the car 50 units above the current node, facing along it.
    pub fn reset(&mut self, track: &Track) -> Result<()> {
        let current = self.ensure_track(track)?;
        let node = track.node(current)?;

        self.position = node.position + Vector::new(0.0, RESET_DROP_HEIGHT, 0.0);
        self.direction = node.forward();
        self.up = v3(WORLD_UP);
        self.previous_position = self.position;
        self.speed = 0.0;
        self.air.on_ground = false;

        debug!(node = node.number, "reset");
        Ok(())
    }

    pub fn launch(&mut self) {
        if self.air.on_ground {
            debug!(speed = self.speed, y = self.position.y, "launched");
        }
        self.air.launch(&mut self.position);
    }

    fn ensure_track(&self, track: &Track) -> Result<usize> {
        let id = self.track_id.ok_or_else(|| anyhow!("vehicle has no track assigned"))?;
        ensure!(id == track.id, "vehicle is assigned to another track than '{}'", track.name);
        self.current_node.ok_or_else(|| anyhow!("vehicle has no current node"))
    }

    // ==============================================================================
    // UPDATE
    // ==============================================================================
    pub fn update(
        &mut self,
        track: &Track,
        input: &ControllerInput,
        elapsed: f32,
        fence: &mut dyn FenceCollision,
        events: &mut dyn VehicleEvents,
    ) -> Result<()> {
        ensure!(elapsed.is_finite() && elapsed >= 0.0, "invalid frame time {elapsed}");
        self.ensure_track(track)?;

        self.previous_position = self.position;
        self.move_factor = move_factor(elapsed);
        let input = input.clamped();

        for wheel in self.wheels.iter_mut() {
            wheel.is_skidding = false;
        }

        if input.reset {
            self.reset(track)?;
        }

        let steering_skid = self.update_steering(&input, elapsed);
        self.direction = rotate_around(&self.direction, &self.up, self.rotation_change);

        let spinning = self.update_engine_force(&input, elapsed, events);
        self.update_drag(&input, elapsed);
        events.skid(steering_skid || spinning);

        self.position += self.direction * self.speed * self.move_factor;
        events.engine(self.motor.rpm(), self.motor.throttle());

        let current = self.update_track_node(track)?;
        let node = track.node(current)?;
        let next = track.next_of(current)?;
        let jump = input.jump && self.air.on_ground;
        if jump || airborne::crest_ahead(node.slope, next.slope, self.speed) {
            self.launch();
        }

        self.update_ground(track, current)?;
        self.update_wheels(elapsed);
        self.refresh_transform();
        self.apply_gravity_and_check_for_collisions(track, elapsed, fence, events);

        Ok(())
    }

    // ------------------------------------------------------------
    // Steering: returns the skid cue of the slip / collision path
    // ------------------------------------------------------------
    fn update_steering(&mut self, input: &ControllerInput, elapsed: f32) -> bool {
        self.steering_wheel = steering::update_steering_wheel(
            self.steering_wheel,
            input.turn,
            self.config.max_steering_lock,
            self.config.steering_speed,
            elapsed,
        );

        let out = steering::solve_steering(&SteeringInput {
            steering_wheel: self.steering_wheel,
            speed: self.speed,
            mass: self.config.mass,
            brake: input.brake,
            on_ground: self.air.on_ground,
            collision_rotation: self.rotate_after_collision,
            max_rotation_per_sec: self.config.max_rotation_per_sec,
            elapsed,
        });

        self.rotation_change = out.rotation_change;
        self.rotate_after_collision = out.collision_rotation;
        if let Some(slip) = out.slip_factor {
            self.slip_factor = slip;
        }
        if out.skid_all_wheels {
            for wheel in self.wheels.iter_mut() {
                wheel.is_skidding = true;
            }
        }
        out.skid_sound
    }

    // ------------------------------------------------------------
    // Engine force: returns true when the driven wheels spin
    // ------------------------------------------------------------
    fn update_engine_force(&mut self, input: &ControllerInput, elapsed: f32, events: &mut dyn VehicleEvents) -> bool {
        self.previous_speed = self.speed;

        self.motor.set_throttle(input.accelerate);
        let accel_force = self.motor.power_output() * traction::POWER_TO_FORCE;

        let mut spin_skid = false;
        if self.motor.gear_engaged() && self.motor.current_gear() > 0 {
            let ratio = traction::traction_ratio(self.config.traction, self.speed, accel_force);
            let spinning = traction::wheels_spinning(ratio, self.motor.rpm(), self.speed, self.motor.throttle());
            self.motor.set_wheels_spinning(spinning);

            if spinning {
                spin_skid = true;
                for wheel in self.wheels.iter_mut().filter(|w| w.id.is_rear()) {
                    wheel.is_skidding = true;
                }
            } else if !self.air.on_ground {
                self.motor.set_wheels_spinning(true);
            }
        }

        for wheel in self.wheels.iter_mut() {
            wheel.update(elapsed);
        }

        self.motor.update(self.speed, elapsed);
        if let Some(gear) = self.motor.take_gear_changed() {
            events.gear_changed(gear);
        }

        if self.motor.at_redline() && !self.motor.wheels_spinning() {
            self.force *= traction::REDLINE_FORCE_CUT;
        }

        if self.motor.throttle() == 0.0 && self.speed.abs() < traction::STANDSTILL_SPEED {
            self.speed = 0.0;
        }

        if self.air.on_ground {
            self.force += self.direction * accel_force * self.move_factor;
            self.speed += traction::speed_gain(&self.force, self.config.mass, &self.direction);
        }

        spin_skid
    }

    // ------------------------------------------------------------
    // Drag + suspension
    // ------------------------------------------------------------
    fn update_drag(&mut self, input: &ControllerInput, elapsed: f32) {
        let friction = drag::friction(self.speed, self.air.on_ground);
        self.force *= friction.force_damping(elapsed);
        self.speed *= friction.speed_damping(elapsed);

        if !self.air.on_ground {
            return;
        }

        let ground_drag = drag::ground_drag(&DragInput {
            speed: self.speed,
            brake: input.brake,
            steering_wheel: self.steering_wheel,
            wheels_off_road: self.wheels_outside_road,
            motor_friction: self.motor.current_friction(),
        });
        self.speed = drag::apply_drag(self.speed, ground_drag, elapsed);

        let speed_change = self.speed - self.previous_speed;
        self.pitch.change_position(speed_change * PITCH_PER_SPEED_CHANGE);
        self.roll
            .change_position(self.steering_wheel * ROLL_PER_LOCK * (self.speed / ROLL_FULL_SPEED).min(1.0));

        self.pitch.simulate(self.move_factor);
        self.roll.simulate(self.move_factor);
    }

    fn update_track_node(&mut self, track: &Track) -> Result<usize> {
        let current = self.ensure_track(track)?;
        let current = match track.step_node(current, &self.position)? {
            NodeStep::Stay => current,
            NodeStep::Advanced(n) => {
                debug!(node = n, "passed node");
                n
            }
            NodeStep::Retreated(n) => {
                debug!(node = n, "passed node (back)");
                n
            }
        };
        self.current_node = Some(current);
        Ok(current)
    }

    fn update_ground(&mut self, track: &Track, current: usize) -> Result<()> {
        let ground = track.sample_ground(current, &self.position)?;

        if self.air.on_ground {
            self.up = ground.up;
            let right = self.right();
            if right.norm() > 1e-6 {
                self.direction = safe_normalize(self.up.cross(&right), self.direction);
            }
            self.position.y = ground.height;
        }
        self.track_height = ground.height;
        Ok(())
    }

    fn update_wheels(&mut self, elapsed: f32) {
        let rear_rate = if self.motor.wheels_spinning() { REAR_SPIN_RATE } else { self.speed };
        for wheel in self.wheels.iter_mut() {
            let rate = if wheel.id.is_front() { self.speed } else { rear_rate };
            wheel.rotation = (wheel.rotation - rate * elapsed).rem_euclid(std::f32::consts::TAU);
            if wheel.id.is_front() {
                wheel.steer(self.steering_wheel);
            }
        }
    }

    fn apply_gravity_and_check_for_collisions(
        &mut self,
        track: &Track,
        elapsed: f32,
        fence: &mut dyn FenceCollision,
        events: &mut dyn VehicleEvents,
    ) {
        self.wheels_outside_road = fence.wheels_outside_road(self, track);

        let off_road = self.speed > OFF_ROAD_CUE_SPEED && self.wheels_outside_road > 0;
        events.off_road(off_road);
        if off_road {
            for wheel in self.wheels.iter_mut().filter(|w| w.id.is_rear()) {
                wheel.is_skidding = true;
            }
        }

        fence.handle(self, track);

        let time_in_air = self.air.time_in_air;
        match self.air.apply_gravity(&mut self.position, &mut self.direction, &mut self.up, self.track_height, elapsed) {
            Some(Landing::Hard) => {
                debug!(time_in_air, "back on ground (hard)");
                events.hit_ground();
            }
            Some(Landing::Soft) => debug!(time_in_air, "back on ground"),
            None => {}
        }
    }

    // ==============================================================================
    // SNAPSHOT / RESTORE
    // ==============================================================================
    pub fn snapshot(&self) -> VehicleSnapshot {
        VehicleSnapshot {
            position: parr(&self.position),
            previous_position: parr(&self.previous_position),
            direction: arr(&self.direction),
            up: arr(&self.up),
            force: arr(&self.force),
            speed: self.speed,
            previous_speed: self.previous_speed,
            steering_wheel: self.steering_wheel,
            slip_factor: self.slip_factor,
            rotation_change: self.rotation_change,
            rotate_after_collision: self.rotate_after_collision,
            air: self.air,
            current_node: self.current_node,
            track_height: self.track_height,
            wheels_outside_road: self.wheels_outside_road,
            wheels: self.wheels,
            pitch: self.pitch,
            roll: self.roll,
            motor: self.motor.snapshot(),
        }
    }

    /// Apply a snapshot. The track assignment itself is kept.
    pub fn restore(&mut self, snap: &VehicleSnapshot) {
        self.position = p3(snap.position);
        self.previous_position = p3(snap.previous_position);
        self.direction = v3(snap.direction);
        self.up = v3(snap.up);
        self.force = v3(snap.force);
        self.speed = snap.speed;
        self.previous_speed = snap.previous_speed;
        self.steering_wheel = snap.steering_wheel;
        self.slip_factor = snap.slip_factor;
        self.rotation_change = snap.rotation_change;
        self.rotate_after_collision = snap.rotate_after_collision;
        self.air = snap.air;
        self.current_node = snap.current_node;
        self.track_height = snap.track_height;
        self.wheels_outside_road = snap.wheels_outside_road;
        self.wheels = snap.wheels;
        self.pitch = snap.pitch;
        self.roll = snap.roll;
        self.motor.restore(&snap.motor);
        self.refresh_transform();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub position: [f32; 3],
    pub previous_position: [f32; 3],
    pub direction: [f32; 3],
    pub up: [f32; 3],
    pub force: [f32; 3],
    pub speed: f32,
    pub previous_speed: f32,
    pub steering_wheel: f32,
    pub slip_factor: f32,
    pub rotation_change: f32,
    pub rotate_after_collision: f32,
    pub air: AirState,
    pub current_node: Option<usize>,
    pub track_height: f32,
    pub wheels_outside_road: u8,
    pub wheels: [Wheel; 4],
    pub pitch: Spring,
    pub roll: Spring,
    pub motor: MotorState,
}
