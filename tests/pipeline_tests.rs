//! Pipeline Tests - full `Vehicle::update` runs against built tracks
//!
//! Bounds that must hold on every tick (steering lock, unit frame, slip),
//! skid / landing notifications, the throttle equilibrium on a straight,
//! node walking, reset placement and snapshot determinism.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use racer_physics::collab::{EventLog, NoFence, VehicleEvent, VergeFence};
use racer_physics::config::SEDAN;
use racer_physics::dynamics::ControllerInput;
use racer_physics::track::{Track, TrackBuilder};
use racer_physics::vehicle::{Vehicle, VehicleSnapshot};

const DT: f32 = 1.0 / 60.0;

fn car_on(track: &Track, node: usize) -> Vehicle {
    let mut v = Vehicle::new(SEDAN);
    v.assign_track(track).unwrap();
    v.place_at_node(track, node).unwrap();
    v
}

fn throttle() -> ControllerInput {
    ControllerInput { accelerate: 1.0, ..Default::default() }
}

fn random_inputs(seed: u64, count: usize) -> Vec<ControllerInput> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| ControllerInput {
            turn: rng.gen_range(-1.0..=1.0),
            accelerate: if rng.gen_bool(0.7) { rng.gen_range(0.5..=1.0) } else { 0.0 },
            brake: if rng.gen_bool(0.15) { rng.gen_range(0.0..=1.0) } else { 0.0 },
            reset: rng.gen_bool(0.002),
            jump: false,
        })
        .collect()
}

// ============================================================================
// Per-tick bounds
// ============================================================================

#[test]
fn test_random_driving_keeps_bounds() {
    let track = TrackBuilder::ring("ring", 64, 400.0, 15.0).build().unwrap();
    let mut v = car_on(&track, 0);
    let mut fence = VergeFence::default();
    let mut log = EventLog::new();

    for (i, input) in random_inputs(11, 3000).iter().enumerate() {
        v.update(&track, input, DT, &mut fence, &mut log).unwrap();

        assert!(v.steering_wheel.abs() <= SEDAN.max_steering_lock, "tick {i}: wheel {}", v.steering_wheel);
        assert!((0.0..=0.91).contains(&v.slip_factor), "tick {i}: slip {}", v.slip_factor);
        assert!((v.direction.norm() - 1.0).abs() < 1e-4, "tick {i}: |direction| = {}", v.direction.norm());
        assert!((v.up.norm() - 1.0).abs() < 1e-4, "tick {i}: |up| = {}", v.up.norm());
        assert!(v.direction.dot(&v.up).abs() < 1e-3, "tick {i}: frame not orthogonal");
        assert!(v.speed.is_finite() && v.position.coords.iter().all(|c| c.is_finite()));
    }
}

#[test]
fn test_hard_braking_skids_every_wheel() {
    let track = TrackBuilder::straight("straight", 100, 25.0, 20.0).build().unwrap();
    let mut v = car_on(&track, 0);
    v.speed = 60.0;
    let mut log = EventLog::new();

    let brake = ControllerInput { brake: 0.8, ..Default::default() };
    v.update(&track, &brake, DT, &mut NoFence, &mut log).unwrap();

    assert!(v.wheels.iter().all(|w| w.is_skidding));
    assert!(log.is_skidding());
    assert!(v.speed < 60.0);
}

#[test]
fn test_braking_never_reverses() {
    let track = TrackBuilder::straight("straight", 100, 25.0, 20.0).build().unwrap();
    let mut v = car_on(&track, 0);
    v.speed = 20.0;
    let brake = ControllerInput { brake: 1.0, ..Default::default() };

    let mut log = EventLog::new();
    for _ in 0..300 {
        v.update(&track, &brake, DT, &mut NoFence, &mut log).unwrap();
        assert!(v.speed >= 0.0);
    }
    assert_eq!(v.speed, 0.0);
}

// ============================================================================
// Throttle equilibrium
// ============================================================================

#[test]
fn test_full_throttle_settles_at_top_speed() {
    let track = TrackBuilder::straight("drag strip", 1000, 25.0, 20.0).build().unwrap();
    let mut v = car_on(&track, 0);
    let mut log = EventLog::new();

    let mut speeds = Vec::with_capacity(2400);
    for _ in 0..2400 {
        v.update(&track, &throttle(), DT, &mut NoFence, &mut log).unwrap();
        speeds.push(v.speed);
    }

    for (i, pair) in speeds.windows(2).enumerate() {
        assert!(pair[1] >= pair[0] - 1e-3, "speed dropped at tick {}: {} -> {}", i + 1, pair[0], pair[1]);
    }

    let settled = &speeds[1800..];
    let lo = settled.iter().cloned().fold(f32::INFINITY, f32::min);
    let hi = settled.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    assert!(lo > 150.0, "top speed too low: {lo}");
    assert!(hi - lo < 0.05, "still accelerating: {lo}..{hi}");
    assert_eq!(v.motor.current_gear(), 5);
}

// ============================================================================
// Node walk
// ============================================================================

#[test]
fn test_one_advance_per_crossing() {
    let track = TrackBuilder::straight("straight", 20, 25.0, 20.0).build().unwrap();
    let mut v = car_on(&track, 3);
    v.speed = 40.0;
    let mut log = EventLog::new();

    let mut nodes = vec![v.current_node.unwrap()];
    while v.position.z > track.nodes[4].position.z - 10.0 {
        v.update(&track, &ControllerInput::default(), DT, &mut NoFence, &mut log).unwrap();
        nodes.push(v.current_node.unwrap());
    }
    nodes.dedup();
    assert_eq!(nodes, vec![3, 4]);
}

#[test]
fn test_node_walk_is_lazy() {
    let track = TrackBuilder::straight("straight", 20, 25.0, 20.0).build().unwrap();
    let mut v = car_on(&track, 0);
    // teleport two cross-sections ahead; the walk catches up one node per tick
    v.position.z = -60.0;
    let mut log = EventLog::new();

    v.update(&track, &ControllerInput::default(), DT, &mut NoFence, &mut log).unwrap();
    assert_eq!(v.current_node, Some(1));
    v.update(&track, &ControllerInput::default(), DT, &mut NoFence, &mut log).unwrap();
    assert_eq!(v.current_node, Some(2));
    v.update(&track, &ControllerInput::default(), DT, &mut NoFence, &mut log).unwrap();
    assert_eq!(v.current_node, Some(2));
}

#[test]
fn test_reversing_walks_back() {
    let track = TrackBuilder::straight("straight", 20, 25.0, 20.0).build().unwrap();
    let mut v = car_on(&track, 5);
    v.position.z += 30.0; // behind node 4's cross-section
    let mut log = EventLog::new();

    v.update(&track, &ControllerInput::default(), DT, &mut NoFence, &mut log).unwrap();
    assert_eq!(v.current_node, Some(4));
}

#[test]
fn test_running_off_an_open_track_is_fatal() {
    let track = TrackBuilder::straight("short", 3, 25.0, 20.0).build().unwrap();
    let mut v = car_on(&track, 1);
    v.speed = 100.0;
    let mut log = EventLog::new();

    let mut failure = None;
    for _ in 0..200 {
        if let Err(err) = v.update(&track, &throttle(), DT, &mut NoFence, &mut log) {
            failure = Some(err);
            break;
        }
    }
    let err = failure.expect("update should fail at the last node");
    assert!(format!("{err:#}").contains("no next link"), "{err:#}");
}

// ============================================================================
// Reset / air time
// ============================================================================

#[test]
fn test_reset_places_car_above_current_node() {
    let track = TrackBuilder::ring("ring", 32, 300.0, 15.0).build().unwrap();
    let mut v = car_on(&track, 5);
    v.speed = 80.0;
    v.reset(&track).unwrap();

    let node = &track.nodes[5];
    assert_eq!(v.position, node.position + lift(50.0));
    assert_eq!(v.speed, 0.0);
    assert!(!v.on_ground());

    let heading = node.orientation.to_radians();
    assert!((v.direction.x + heading.sin()).abs() < 1e-5);
    assert!(v.direction.y.abs() < 1e-6);
    assert!((v.direction.z + heading.cos()).abs() < 1e-5);
}

#[test]
fn test_reset_flag_in_input() {
    let track = TrackBuilder::straight("straight", 20, 25.0, 20.0).build().unwrap();
    let mut v = car_on(&track, 2);
    let mut log = EventLog::new();

    let input = ControllerInput { reset: true, ..Default::default() };
    v.update(&track, &input, DT, &mut NoFence, &mut log).unwrap();

    assert!(!v.on_ground());
    assert!(v.position.y > 49.0 && v.position.y <= 50.0, "y={}", v.position.y);
    assert_eq!(v.speed, 0.0);
}

#[test]
fn test_long_fall_hits_ground_once() {
    let track = TrackBuilder::straight("straight", 20, 25.0, 20.0).build().unwrap();
    let mut v = car_on(&track, 2);
    v.position.y = 10.0;
    v.launch();
    let mut log = EventLog::new();

    for _ in 0..200 {
        v.update(&track, &ControllerInput::default(), DT, &mut NoFence, &mut log).unwrap();
    }
    assert_eq!(log.count(&VehicleEvent::HitGround), 1);
    assert!(v.on_ground());
    assert_eq!(v.position.y, 0.0);
    assert_eq!(v.air.time_in_air, 0.0);
}

#[test]
fn test_short_hop_is_silent() {
    let track = TrackBuilder::straight("straight", 20, 25.0, 20.0).build().unwrap();
    let mut v = car_on(&track, 2);
    let mut log = EventLog::new();

    let jump = ControllerInput { jump: true, ..Default::default() };
    v.update(&track, &jump, DT, &mut NoFence, &mut log).unwrap();
    assert!(!v.on_ground());

    for _ in 0..30 {
        v.update(&track, &ControllerInput::default(), DT, &mut NoFence, &mut log).unwrap();
    }
    assert!(v.on_ground());
    assert_eq!(log.count(&VehicleEvent::HitGround), 0);
}

#[test]
fn test_held_jump_only_hops_from_the_ground() {
    let track = TrackBuilder::straight("straight", 20, 25.0, 20.0).build().unwrap();
    let mut v = car_on(&track, 2);
    let mut log = EventLog::new();

    let jump = ControllerInput { jump: true, ..Default::default() };
    let mut highest = f32::NEG_INFINITY;
    for _ in 0..600 {
        v.update(&track, &jump, DT, &mut NoFence, &mut log).unwrap();
        highest = highest.max(v.position.y);
    }
    assert!(highest < 0.5, "car climbed to {highest}");

    for _ in 0..5 {
        v.update(&track, &ControllerInput::default(), DT, &mut NoFence, &mut log).unwrap();
    }
    assert!(v.on_ground());
    assert_eq!(v.position.y, 0.0);
    assert_eq!(log.count(&VehicleEvent::HitGround), 0);
}

#[test]
fn test_crest_launches_fast_cars() {
    let mut builder = TrackBuilder::straight("crest", 20, 25.0, 20.0);
    for spec in builder.specs_mut().iter_mut().take(4) {
        spec.slope = 60.0;
    }
    let track = builder.build().unwrap();

    let mut fast = car_on(&track, 3);
    fast.speed = 120.0;
    let mut slow = car_on(&track, 3);
    slow.speed = 60.0;

    let mut log = EventLog::new();
    fast.update(&track, &throttle(), DT, &mut NoFence, &mut log).unwrap();
    slow.update(&track, &throttle(), DT, &mut NoFence, &mut log).unwrap();

    assert!(!fast.on_ground());
    assert!(slow.on_ground());
    assert!(fast.air.up_velocity < 0.0);
}

// ============================================================================
// Off-road + fence
// ============================================================================

#[test]
fn test_wheels_over_the_verge_are_off_road() {
    let track = TrackBuilder::straight("straight", 20, 25.0, 20.0).build().unwrap();
    let mut v = car_on(&track, 2);
    v.position.x = 19.0; // right wheels at x = 20.5
    v.speed = 40.0;
    let mut log = EventLog::new();
    let mut fence = VergeFence::default();

    v.update(&track, &ControllerInput::default(), DT, &mut fence, &mut log).unwrap();

    assert_eq!(v.wheels_outside_road, 2);
    assert!(log.is_off_road());
    assert!(v.wheels[2].is_skidding && v.wheels[3].is_skidding);
    assert!((v.position.x - 19.0).abs() < 1e-4, "inside the verge, no push");
}

#[test]
fn test_fence_pushes_car_back() {
    let track = TrackBuilder::straight("straight", 20, 25.0, 20.0).build().unwrap();
    let mut v = car_on(&track, 2);
    v.position.x = 30.0;
    v.speed = 40.0;
    let mut log = EventLog::new();
    let mut fence = VergeFence::default();

    v.update(&track, &ControllerInput::default(), DT, &mut fence, &mut log).unwrap();

    let limit = 20.0 + fence.verge;
    assert!((v.position.x - limit).abs() < 1e-3, "x={}", v.position.x);
    assert!(v.speed < 40.0 * fence.speed_loss + 1e-3);
}

// ============================================================================
// Snapshot determinism
// ============================================================================

#[test]
fn test_snapshot_round_trip_is_bit_exact() {
    let track = TrackBuilder::ring("ring", 64, 400.0, 15.0).build().unwrap();
    let inputs = random_inputs(42, 600);

    let mut a = car_on(&track, 0);
    let mut fence_a = VergeFence::default();
    let mut log_a = EventLog::new();
    for input in &inputs[..300] {
        a.update(&track, input, DT, &mut fence_a, &mut log_a).unwrap();
    }

    let json = serde_json::to_string(&a.snapshot()).unwrap();
    let snap: VehicleSnapshot = serde_json::from_str(&json).unwrap();

    let mut b = Vehicle::new(SEDAN);
    b.assign_track(&track).unwrap();
    b.restore(&snap);
    assert_eq!(b.snapshot(), a.snapshot());

    let mut fence_b = VergeFence::default();
    let mut log_b = EventLog::new();
    for (i, input) in inputs[300..].iter().enumerate() {
        a.update(&track, input, DT, &mut fence_a, &mut log_a).unwrap();
        b.update(&track, input, DT, &mut fence_b, &mut log_b).unwrap();
        assert_eq!(a.snapshot(), b.snapshot(), "diverged {} ticks after restore", i + 1);
    }
}

fn lift(h: f32) -> rapier3d::prelude::Vector<f32> {
    rapier3d::prelude::Vector::new(0.0, h, 0.0)
}
