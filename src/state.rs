// ==============================================================================
// state.rs — SHARED SERVER STATE + THE SIMULATED RACE
// ------------------------------------------------------------------------------
// SharedRaceState: connected viewers (outgoing channels), the tick counter and
//                  the latest controller input sent by a viewer.
// Race:            the track, the car and its collaborators (fence, event log)
//                  plus a scripted driver used while no viewer is driving.
// ==============================================================================

use std::collections::HashMap;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;
use uuid::Uuid;

use crate::collab::{EventLog, VergeFence};
use crate::config::VehicleConfig;
use crate::dynamics::types::{ControllerInput, safe_normalize};
use crate::telemetry::VehicleTelemetry;
use crate::track::Track;
use crate::vehicle::Vehicle;

pub struct SharedRaceState {
    pub tick: u64,
    pub clients: HashMap<Uuid, UnboundedSender<String>>,
    pub input: Option<ControllerInput>,
    pub driver: Option<Uuid>, // viewer whose input drives the car
}

impl SharedRaceState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            clients: HashMap::new(),
            input: None,
            driver: None,
        }
    }

    pub fn register_client(&mut self, tx: UnboundedSender<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.clients.insert(id, tx);
        id
    }

    pub fn remove_client(&mut self, id: &Uuid) {
        self.clients.remove(id);
        if self.driver == Some(*id) {
            self.driver = None;
            self.input = None;
        }
    }

    /// Last writer drives. Pending reset / jump requests are kept until the
    /// tick consumes them.
    pub fn update_input(&mut self, id: Uuid, input: ControllerInput) {
        let reset = input.reset || self.input.is_some_and(|i| i.reset);
        let jump = input.jump || self.input.is_some_and(|i| i.jump);
        self.driver = Some(id);
        self.input = Some(ControllerInput { reset, jump, ..input.clamped() });
    }

    /// Input for the coming tick; one-shot flags are cleared once read.
    pub fn take_input(&mut self) -> Option<ControllerInput> {
        let input = self.input?;
        if let Some(stored) = self.input.as_mut() {
            stored.reset = false;
            stored.jump = false;
        }
        Some(input)
    }

    pub fn broadcast(&mut self, telemetry: &VehicleTelemetry) {
        let json = match serde_json::to_string(telemetry) {
            Ok(json) => json,
            Err(err) => {
                warn!(%err, "telemetry serialisation failed");
                return;
            }
        };
        // drop viewers whose send loop is gone
        self.clients.retain(|_, tx| tx.send(json.clone()).is_ok());
    }
}

impl Default for SharedRaceState {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================
// Race
// ============================================
pub struct Race {
    pub track: Track,
    pub vehicle: Vehicle,
    pub fence: VergeFence,
    pub events: EventLog,
    pub autopilot: Autopilot,
}

impl Race {
    pub fn new(track: Track, config: VehicleConfig, seed: u64) -> Result<Self> {
        let mut vehicle = Vehicle::new(config);
        vehicle.assign_track(&track).context("assigning track")?;
        vehicle.place_at_node(&track, track.start).context("placing car on the start node")?;

        Ok(Self {
            track,
            vehicle,
            fence: VergeFence::default(),
            events: EventLog::new(),
            autopilot: Autopilot::new(seed),
        })
    }

    /// One fixed step. Viewer input wins over the scripted driver.
    pub fn step(&mut self, tick: u64, input: Option<ControllerInput>, elapsed: f32) -> Result<VehicleTelemetry> {
        let input = match input {
            Some(input) => input,
            None => self.autopilot.drive(&self.vehicle, &self.track),
        };

        self.vehicle
            .update(&self.track, &input, elapsed, &mut self.fence, &mut self.events)
            .with_context(|| format!("vehicle update failed at tick {tick}"))?;

        Ok(VehicleTelemetry::capture(tick, &self.vehicle, self.events.drain()))
    }
}

// ============================================
// Scripted driver
// ============================================
const LOOK_AHEAD_NODES: usize = 3;
const STEER_GAIN: f32 = 4.0;
const CORNER_SPEED: f32 = 90.0;

pub struct Autopilot {
    rng: StdRng,
    jitter: f32,
}

impl Autopilot {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), jitter: 0.05 }
    }

    /// Aim at a node a few ahead; full throttle, lift and brake into tight turns.
    pub fn drive(&mut self, vehicle: &Vehicle, track: &Track) -> ControllerInput {
        let Some(target) = vehicle.current_node.and_then(|mut i| {
            for _ in 0..LOOK_AHEAD_NODES {
                i = track.nodes.get(i)?.next.unwrap_or(i);
            }
            track.nodes.get(i)
        }) else {
            return ControllerInput::default();
        };

        let mut to_target = target.position - vehicle.position;
        to_target.y = 0.0;
        // positive y: target is to the left, which is a negative turn
        let side = vehicle.direction.cross(&safe_normalize(to_target, vehicle.direction)).y;
        let noise = self.rng.gen_range(-self.jitter..=self.jitter);
        let turn = (-side * STEER_GAIN + noise).clamp(-1.0, 1.0);

        let tight = turn.abs() > 0.8 && vehicle.speed > CORNER_SPEED;
        ControllerInput {
            turn,
            accelerate: if tight { 0.0 } else { 1.0 },
            brake: if tight { 0.3 } else { 0.0 },
            reset: !vehicle.on_ground() && vehicle.position.y < target.position.y - 20.0,
            jump: false,
        }
    }
}
