use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use racer_physics::config::ServerConfig;
use racer_physics::net::start_websocket_server;
use racer_physics::state::{Race, SharedRaceState};
use racer_physics::track::TrackBuilder;

const DEMO_RING_NODES: usize = 96;
const DEMO_RING_RADIUS: f32 = 600.0;
const DEMO_ROAD_HALF_WIDTH: f32 = 15.0;
const AUTOPILOT_SEED: u64 = 0x5eed;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting racer physics server");

    let config = ServerConfig::from_env().context("reading server config")?;
    let vehicle = config.vehicle_config()?;

    let track = TrackBuilder::ring("demo ring", DEMO_RING_NODES, DEMO_RING_RADIUS, DEMO_ROAD_HALF_WIDTH)
        .build()
        .context("building demo track")?;
    info!(track = %track.name, nodes = track.len(), "track loaded");

    let mut race = Race::new(track, vehicle, AUTOPILOT_SEED)?;
    let state = Arc::new(Mutex::new(SharedRaceState::new()));

    // Start WebSocket server
    let mut server = tokio::spawn(start_websocket_server(Arc::clone(&state), config.bind.clone()));

    // Fixed timestep
    let dt = config.tick_seconds();
    let mut ticker = interval(Duration::from_secs_f32(dt));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            joined = &mut server => {
                let res = joined.context("WebSocket server task panicked")?;
                error!("WebSocket server stopped");
                return res;
            }
        }

        let mut shared = state.lock().await;
        let tick = shared.tick + 1;
        let input = shared.take_input();

        let telemetry = match race.step(tick, input, dt) {
            Ok(t) => t,
            Err(err) => {
                error!("physics fault, stopping: {err:#}");
                return Err(err);
            }
        };

        shared.tick = tick;
        shared.broadcast(&telemetry);
    }
}
