// dynamics/mod.rs
// Engine-agnostic leaf subsystems of the vehicle model.
// No track, no collaborators, no logging: plain data in, plain data out.

pub mod types;
pub mod spring;
pub mod wheel;
pub mod steering;
pub mod drag;
pub mod traction;
pub mod motor;
pub mod airborne;

pub use types::{ControllerInput, Pos3, Vec3, WheelId};
pub use spring::Spring;
pub use wheel::Wheel;
pub use motor::{Engine, EngineConfig, Motor, MotorState};
pub use airborne::{AirState, Landing};
