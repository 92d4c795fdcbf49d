// ==============================================================================
// collab.rs — EXTERNAL COLLABORATOR SEAMS
// ------------------------------------------------------------------------------
// VehicleEvents:  fire-and-forget notification sink (skid, off-road, gear
//                 change, hard landing, engine). Called inline during the tick,
//                 at most once per kind per tick. All methods default to no-op.
// FenceCollision: reports how many wheels are off the road and may push the car
//                 back inside the track boundaries.
//
// Stock implementations:
// - NullEvents / NoFence: do nothing
// - EventLog: keeps only the edges (skid start/stop, ...) for viewers + tests
// - VergeFence: lateral band check against the current node's cross-section
// ==============================================================================

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dynamics::types::{Vec3, safe_normalize};
use crate::track::Track;
use crate::vehicle::Vehicle;

// ============================================
// Notifications
// ============================================
pub trait VehicleEvents {
    fn skid(&mut self, _on: bool) {}
    fn off_road(&mut self, _on: bool) {}
    fn gear_changed(&mut self, _gear: i32) {}
    fn hit_ground(&mut self) {}
    fn engine(&mut self, _rpm: f32, _throttle: f32) {}
}

pub struct NullEvents;

impl VehicleEvents for NullEvents {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VehicleEvent {
    SkidStart,
    SkidStop,
    OffRoadStart,
    OffRoadStop,
    GearChanged { gear: i32 },
    HitGround,
}

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<VehicleEvent>,
    skidding: bool,
    off_road: bool,
    pub rpm: f32,
    pub throttle: f32,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[VehicleEvent] {
        &self.events
    }

    pub fn drain(&mut self) -> Vec<VehicleEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn count(&self, event: &VehicleEvent) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }

    pub fn is_skidding(&self) -> bool {
        self.skidding
    }

    pub fn is_off_road(&self) -> bool {
        self.off_road
    }
}

impl VehicleEvents for EventLog {
    fn skid(&mut self, on: bool) {
        if on != self.skidding {
            self.skidding = on;
            self.events.push(if on { VehicleEvent::SkidStart } else { VehicleEvent::SkidStop });
        }
    }

    fn off_road(&mut self, on: bool) {
        if on != self.off_road {
            self.off_road = on;
            self.events.push(if on { VehicleEvent::OffRoadStart } else { VehicleEvent::OffRoadStop });
        }
    }

    fn gear_changed(&mut self, gear: i32) {
        self.events.push(VehicleEvent::GearChanged { gear });
    }

    fn hit_ground(&mut self) {
        self.events.push(VehicleEvent::HitGround);
    }

    fn engine(&mut self, rpm: f32, throttle: f32) {
        self.rpm = rpm;
        self.throttle = throttle;
    }
}

// ============================================
// Boundaries
// ============================================
pub trait FenceCollision {
    fn wheels_outside_road(&mut self, vehicle: &Vehicle, track: &Track) -> u8;
    fn handle(&mut self, vehicle: &mut Vehicle, track: &Track);
}

pub struct NoFence;

impl FenceCollision for NoFence {
    fn wheels_outside_road(&mut self, _vehicle: &Vehicle, _track: &Track) -> u8 {
        0
    }

    fn handle(&mut self, _vehicle: &mut Vehicle, _track: &Track) {}
}

/// Road band = the current node's cross-section. Wheels past either boundary
/// count as off-road; a chassis centre more than `verge` units past it hits
/// the fence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VergeFence {
    pub verge: f32,
    pub speed_loss: f32,   // speed multiplier on impact
    pub max_rebound: f32,  // radians of post-collision spin
}

impl Default for VergeFence {
    fn default() -> Self {
        Self { verge: 3.0, speed_loss: 0.8, max_rebound: 0.6 }
    }
}

impl FenceCollision for VergeFence {
    fn wheels_outside_road(&mut self, vehicle: &Vehicle, track: &Track) -> u8 {
        let Some(node) = vehicle.current_node.and_then(|i| track.nodes.get(i)) else {
            return 0;
        };
        let outside = vehicle
            .wheels
            .iter()
            .map(|w| node.lateral(&w.world_position(&vehicle.transform)))
            .filter(|t| !(0.0..=1.0).contains(t))
            .count();
        outside as u8
    }

    fn handle(&mut self, vehicle: &mut Vehicle, track: &Track) {
        let Some(node) = vehicle.current_node.and_then(|i| track.nodes.get(i)) else {
            return;
        };

        let width = node.road_width();
        let t = node.lateral(&vehicle.position);
        let excess = if t < 0.0 {
            -t * width
        } else if t > 1.0 {
            (t - 1.0) * width
        } else {
            0.0
        };
        if excess <= self.verge {
            return;
        }

        let mut across = node.right_boundary - node.left_boundary;
        across.y = 0.0;
        let across = safe_normalize(across, Vec3::x());
        let outward = if t > 1.0 { across } else { -across };

        vehicle.position -= outward * (excess - self.verge);
        vehicle.speed *= self.speed_loss;

        // turn the nose away from the wall; positive yaw turns left
        let incidence = vehicle.direction.dot(&outward);
        if incidence > 0.0 && vehicle.rotate_after_collision == 0.0 {
            let angle = incidence.min(1.0).asin().min(self.max_rebound);
            vehicle.rotate_after_collision = if t > 1.0 { angle } else { -angle };
        }

        debug!(node = node.number, excess, speed = vehicle.speed, "fence hit");
    }
}
