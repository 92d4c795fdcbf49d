//! racer_physics - per-tick arcade vehicle dynamics on a node-based track,
//! plus the pieces of the fixed-tick simulation server.

pub mod dynamics;
pub mod track;
pub mod vehicle;
pub mod chassis;
pub mod collab;
pub mod config;
pub mod telemetry;
pub mod state;
pub mod net;

pub use collab::{EventLog, FenceCollision, NoFence, NullEvents, VehicleEvent, VehicleEvents, VergeFence};
pub use config::{ServerConfig, VehicleConfig};
pub use dynamics::{ControllerInput, Engine, Motor};
pub use track::{Track, TrackBuilder, TrackNode};
pub use vehicle::{Vehicle, VehicleSnapshot};
