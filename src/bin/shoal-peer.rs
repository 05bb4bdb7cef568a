//! Headless peer: bind a discovery port, join the LAN session, load a
//! scenario and simulate until interrupted.
//!
//! Usage: `shoal-peer [scenario] [seconds]` - scenario defaults to 1,
//! seconds to 0 (run forever).

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::info;

use shoal::{default_worker_count, Endpoint, Replicator, Scheduler, SimConfig, World};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut args = std::env::args().skip(1);
    let scenario: u8 = args
        .next()
        .map(|raw| raw.parse().context("scenario id must be a number"))
        .transpose()?
        .unwrap_or(1);
    let seconds: u64 = args
        .next()
        .map(|raw| raw.parse().context("run time must be whole seconds"))
        .transpose()?
        .unwrap_or(0);

    let config = SimConfig::default();
    let world = Arc::new(World::new(config.clone()));

    let endpoint = Arc::new(Endpoint::bind(&config).context("no free peer slot")?);
    info!(
        peer_id = endpoint.local_peer_id(),
        port = endpoint.local_port(),
        "joined session"
    );
    world.attach_endpoint(endpoint.clone());

    let mut replicator = Replicator::start(world.clone(), endpoint.clone())?;
    endpoint.announce();

    world.load_scenario(scenario);

    let workers = default_worker_count(config.reserved_cores);
    let mut scheduler = Scheduler::start(world.clone(), workers)?;
    info!(scenario, workers, "simulating");

    // Stand-in for the render loop: drain deferred work at the graphics
    // rate and report the measured frequencies once in a while.
    let started = Instant::now();
    let mut last_report = Instant::now();
    loop {
        world.pump();
        std::thread::sleep(Duration::from_secs_f32(
            1.0 / world.params.target_gfx_hz().max(1.0),
        ));

        if last_report.elapsed() >= Duration::from_secs(5) {
            info!(
                sim_hz = world.params.actual_sim_hz(),
                net_hz = world.params.actual_net_hz(),
                peers = endpoint.peers.len(),
                bodies = world.bodies.moving_count(),
                "status"
            );
            last_report = Instant::now();
        }

        if seconds > 0 && started.elapsed() >= Duration::from_secs(seconds) {
            break;
        }
    }

    scheduler.stop();
    replicator.stop();
    Ok(())
}
