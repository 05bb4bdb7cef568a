//! Replication: the receive loop feeding remote state into the world, and
//! the rate monitor.
//!
//! Owned-object publication happens on the physics workers right after
//! integration (see the scheduler); this module handles the inbound half:
//! datagrams are decoded on the network thread and dispatched either to
//! the shared parameters (overwritten in place) or to the main-thread
//! command queue (remote object state, scenario switches).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, trace};

use crate::world::World;

use super::peer::Endpoint;
use super::wire::{Message, Payload};

/// How long the receive thread naps when the socket is dry.
const IDLE_SLEEP: Duration = Duration::from_millis(1);
/// Granularity of the monitor thread's stop checks.
const MONITOR_SLICE: Duration = Duration::from_millis(100);

/// Route one decoded message.
pub(crate) fn dispatch(world: &World, endpoint: &Endpoint, message: Message, src: SocketAddr) {
    match message.payload {
        Payload::PeerAnnounce(announce) => {
            if announce.peer_id == endpoint.local_peer_id() {
                return;
            }
            // The sender's address is right, its source port is not: use
            // the announced service port.
            let addr = SocketAddr::new(src.ip(), announce.port);
            if endpoint.peers.register(announce.peer_id, addr) {
                debug!(peer = announce.peer_id, %addr, "discovered peer");
                // A fresh face: introduce ourselves again so it learns us
                // even if our startup announce predates its socket.
                endpoint.announce();
            }
        }
        Payload::GlobalState(state) => {
            trace!("applying replicated global state");
            state.apply_to(&world.params);
        }
        Payload::ObjectUpdate(update) => world.handle_object_update(update),
        Payload::ScenarioChange(change) => world.handle_scenario_change(change.scenario_id),
    }
}

/// The network-side service threads: one receive loop, one rate monitor.
pub struct Replicator {
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl Replicator {
    /// Spawn the receive and monitor threads for `endpoint`.
    pub fn start(world: Arc<World>, endpoint: Arc<Endpoint>) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let mut threads = Vec::with_capacity(2);

        {
            let running = running.clone();
            let world = world.clone();
            let endpoint = endpoint.clone();
            threads.push(
                thread::Builder::new()
                    .name("net-recv".into())
                    .spawn(move || {
                        while running.load(Ordering::Acquire) {
                            match endpoint.try_recv() {
                                Some((message, src)) => dispatch(&world, &endpoint, message, src),
                                None => thread::sleep(IDLE_SLEEP),
                            }
                        }
                    })?,
            );
        }

        {
            let running = running.clone();
            threads.push(
                thread::Builder::new()
                    .name("net-monitor".into())
                    .spawn(move || {
                        let mut mark = Instant::now();
                        let mut seen = endpoint.datagram_count();
                        while running.load(Ordering::Acquire) {
                            thread::sleep(MONITOR_SLICE);
                            let elapsed = mark.elapsed();
                            if elapsed.as_secs_f32() >= 1.0 {
                                let count = endpoint.datagram_count();
                                world
                                    .params
                                    .set_actual_net_hz((count - seen) as f32 / elapsed.as_secs_f32());
                                seen = count;
                                mark = Instant::now();
                            }
                        }
                    })?,
            );
        }

        debug!("replication threads started");
        Ok(Self { running, threads })
    }

    /// Signal and join both threads.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!("network thread panicked");
            }
        }
        debug!("replication threads stopped");
    }
}

impl Drop for Replicator {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::net::wire::{self, PeerAnnounce};
    use crate::physics::{Body, Material, ObjectId, Stepper};
    use glam::Vec3;

    fn config(base_port: u16) -> SimConfig {
        SimConfig {
            base_port,
            num_peers: 2,
            ..SimConfig::default()
        }
    }

    fn message(payload: Payload) -> Message {
        Message {
            timestamp_ms: 0,
            payload,
        }
    }

    #[test]
    fn test_announce_registers_and_ignores_self() {
        let config = config(47200);
        let world = Arc::new(World::new(config.clone()));
        let endpoint = Endpoint::bind(&config).unwrap();
        let src = SocketAddr::from(([127, 0, 0, 1], 55555));

        // Own announce: ignored.
        dispatch(
            &world,
            &endpoint,
            message(Payload::PeerAnnounce(PeerAnnounce {
                peer_id: endpoint.local_peer_id(),
                port: endpoint.local_port(),
            })),
            src,
        );
        assert!(endpoint.peers.is_empty());

        // Remote announce: stored under the announced port, not the
        // datagram's source port.
        dispatch(
            &world,
            &endpoint,
            message(Payload::PeerAnnounce(PeerAnnounce {
                peer_id: 1,
                port: 47201,
            })),
            src,
        );
        assert_eq!(
            endpoint.peers.entries(),
            vec![(1, SocketAddr::from(([127, 0, 0, 1], 47201)))]
        );
    }

    #[test]
    fn test_global_state_dispatch_overwrites_params() {
        let config = config(47210);
        let world = Arc::new(World::new(config.clone()));
        let endpoint = Endpoint::bind(&config).unwrap();

        let state = wire::GlobalState {
            paused: true,
            gravity_enabled: false,
            gravity_y: -2.0,
            elasticity: 0.4,
            static_friction: 0.3,
            dynamic_friction: 0.2,
            target_sim_hz: 60.0,
            target_net_hz: 10.0,
        };
        dispatch(
            &world,
            &endpoint,
            message(Payload::GlobalState(state)),
            SocketAddr::from(([127, 0, 0, 1], 1)),
        );

        assert!(world.params.paused());
        assert!(!world.params.gravity_enabled());
        assert_eq!(world.params.target_sim_hz(), 60.0);
    }

    #[test]
    fn test_two_peers_replicate_one_object() {
        let config = config(47220);

        // Peer 0 owns the sphere and simulates it.
        let world_a = Arc::new(World::new(config.clone()));
        let endpoint_a = Arc::new(Endpoint::bind(&config).unwrap());
        world_a.attach_endpoint(endpoint_a.clone());

        // Peer 1 holds the same object as a remote body.
        let world_b = Arc::new(World::new(config.clone()));
        let endpoint_b = Arc::new(Endpoint::bind(&config).unwrap());
        world_b.attach_endpoint(endpoint_b.clone());

        assert_eq!(endpoint_a.local_peer_id(), 0);
        assert_eq!(endpoint_b.local_peer_id(), 1);

        // Skip broadcast discovery; wire the tables up directly.
        endpoint_a
            .peers
            .register(1, SocketAddr::from(([127, 0, 0, 1], endpoint_b.local_port())));
        endpoint_b
            .peers
            .register(0, SocketAddr::from(([127, 0, 0, 1], endpoint_a.local_port())));

        let id = ObjectId::new(0, 0);
        let spawn = |world: &World| {
            let mut body = Body::moving_sphere(Vec3::ZERO, 0.2, 1.0, Material::Steel)
                .with_owner(id, world.local_peer_id());
            body.velocity = Vec3::new(1.0, 0.0, 0.0);
            world.add_body(body);
        };
        spawn(&world_a);
        spawn(&world_b);

        world_a.params.set_gravity_enabled(false);
        world_b.params.set_gravity_enabled(false);

        let mut replicator_b = Replicator::start(world_b.clone(), endpoint_b.clone()).unwrap();

        // Simulate on the owner; every tick publishes an update.
        let stepper = Stepper::new(world_a.clone());
        let mut tracked = false;
        for _ in 0..200 {
            stepper.step();
            world_b.pump();

            let pos_a = world_a.bodies.find(id).unwrap().read().position();
            let body_b = world_b.bodies.find(id).unwrap();
            let pos_b = body_b.read().position();
            if pos_a.x > 0.05 && (pos_a - pos_b).length() < 0.05 {
                tracked = true;
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(tracked, "peer 1 should track peer 0's sphere");

        // The remote copy is never integrated locally: its motion came
        // entirely from replication, and smoothing follows the samples.
        let body_b = world_b.bodies.find(id).unwrap();
        let guard = body_b.read();
        assert!(!guard.is_owned_locally);
        let smoothed = guard.smoothed_position(world_b.now_secs(), false);
        assert!((smoothed - guard.position()).length() < 0.5);

        replicator_b.stop();
    }
}
