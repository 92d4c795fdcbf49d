// ==============================================================================
// telemetry.rs — PER-TICK VEHICLE STATE (SERVER -> VIEWER)
// ------------------------------------------------------------------------------
// Serializable view of one car after a tick:
// - pose (position / direction / up), speed, node, air state, slip, steering
// - motor readout (rpm, gear, spinning)
// - per-wheel visuals (world centre, rotation, steer, skid)
// - suspension spring positions, chassis matrix (column-major), shadow quad
// - notification edges raised during the tick
//
// Pure read-out; nothing here feeds back into the simulation.
// ==============================================================================

use serde::Serialize;

use crate::collab::VehicleEvent;
use crate::dynamics::types::{arr, parr};
use crate::vehicle::Vehicle;

#[derive(Clone, Debug, Serialize)]
pub struct WheelTelemetry {
    pub id: &'static str,  // "FL", "FR", "RL", "RR"
    pub center: [f32; 3],  // world space
    pub rotation: f32,
    pub steer: f32,
    pub skidding: bool,
    pub skid_time: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct VehicleTelemetry {
    pub tick: u64,
    pub position: [f32; 3],
    pub direction: [f32; 3],
    pub up: [f32; 3],
    pub speed: f32,
    pub node: Option<usize>,
    pub on_ground: bool,
    pub time_in_air: f32,
    pub slip_factor: f32,
    pub steering_wheel: f32,
    pub rpm: f32,
    pub gear: i32,
    pub wheels_spinning: bool,
    pub wheels_outside_road: u8,
    pub pitch: f32,
    pub roll: f32,
    pub wheels: Vec<WheelTelemetry>,
    pub chassis: [f32; 16],
    pub shadow: [[f32; 3]; 4],
    pub events: Vec<VehicleEvent>,
}

impl VehicleTelemetry {
    pub fn capture(tick: u64, vehicle: &Vehicle, events: Vec<VehicleEvent>) -> Self {
        let wheels = vehicle
            .wheels
            .iter()
            .map(|w| WheelTelemetry {
                id: w.id.as_str(),
                center: parr(&w.world_position(&vehicle.transform)),
                rotation: w.rotation,
                steer: w.steer_angle,
                skidding: w.is_skidding,
                skid_time: w.skid_time,
            })
            .collect();

        let mut chassis = [0.0; 16];
        chassis.copy_from_slice(vehicle.transform.as_slice());

        Self {
            tick,
            position: parr(&vehicle.position),
            direction: arr(&vehicle.direction),
            up: arr(&vehicle.up),
            speed: vehicle.speed,
            node: vehicle.current_node,
            on_ground: vehicle.air.on_ground,
            time_in_air: vehicle.air.time_in_air,
            slip_factor: vehicle.slip_factor,
            steering_wheel: vehicle.steering_wheel,
            rpm: vehicle.motor.rpm(),
            gear: vehicle.motor.current_gear(),
            wheels_spinning: vehicle.motor.wheels_spinning(),
            wheels_outside_road: vehicle.wheels_outside_road,
            pitch: vehicle.pitch.position,
            roll: vehicle.roll.position,
            wheels,
            chassis,
            shadow: vehicle.shadow().map(|p| parr(&p)),
            events,
        }
    }
}
