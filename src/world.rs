//! The explicit simulation context: bodies, grid, parameters, queues and
//! the network endpoint, shared by the main thread, the physics pool and
//! the receive loop.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};
use glam::Vec3;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace};

use crate::config::SimConfig;
use crate::net::peer::Endpoint;
use crate::net::wire::{GlobalState, ObjectUpdate, Payload, ScenarioChange};
use crate::params::SharedParams;
use crate::physics::{Body, BodyHandle, BodyStore, Material, ObjectId, UniformGrid};
use crate::scenario;

/// Monotonic process clock; the time base for render smoothing.
#[derive(Debug)]
pub struct Clock {
    start: Instant,
}

impl Clock {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// A sphere waiting to be spawned under local ownership.
#[derive(Debug, Clone, Copy)]
pub struct SpawnRequest {
    pub position: Vec3,
    pub radius: f32,
    pub mass: f32,
    pub material: Material,
    pub velocity: Vec3,
}

impl SpawnRequest {
    pub fn sphere(position: Vec3, radius: f32) -> Self {
        Self {
            position,
            radius,
            mass: 1.0,
            material: Material::default(),
            velocity: Vec3::ZERO,
        }
    }
}

/// Work the network thread defers to the main thread, applied between
/// ticks so the physics phases never observe mid-tick mutations.
#[derive(Debug, Clone, Copy)]
pub enum Command {
    ApplyRemote(ObjectUpdate),
    LoadScenario(u8),
}

/// Everything one simulator process shares across its threads.
pub struct World {
    pub config: SimConfig,
    pub params: SharedParams,
    pub bodies: BodyStore,
    pub grid: UniformGrid,
    clock: Clock,
    commands: Mutex<Vec<Command>>,
    spawn_tx: Sender<SpawnRequest>,
    spawn_rx: Receiver<SpawnRequest>,
    next_serial: AtomicU32,
    current_scenario: Mutex<Option<u8>>,
    local_peer_id: AtomicU8,
    endpoint: RwLock<Option<Arc<Endpoint>>>,
}

impl World {
    pub fn new(config: SimConfig) -> Self {
        let params = SharedParams::new(&config);
        let grid = UniformGrid::new(config.half_extent, config.cell_size);
        let (spawn_tx, spawn_rx) = unbounded();
        Self {
            params,
            grid,
            config,
            bodies: BodyStore::new(),
            clock: Clock::new(),
            commands: Mutex::new(Vec::new()),
            spawn_tx,
            spawn_rx,
            next_serial: AtomicU32::new(0),
            current_scenario: Mutex::new(None),
            local_peer_id: AtomicU8::new(0),
            endpoint: RwLock::new(None),
        }
    }

    /// Wire up the bound endpoint; the world adopts its peer id.
    pub fn attach_endpoint(&self, endpoint: Arc<Endpoint>) {
        self.local_peer_id
            .store(endpoint.local_peer_id(), Ordering::Relaxed);
        *self.endpoint.write() = Some(endpoint);
    }

    pub fn local_peer_id(&self) -> u8 {
        self.local_peer_id.load(Ordering::Relaxed)
    }

    /// Seconds on the process clock.
    pub fn now_secs(&self) -> f64 {
        self.clock.seconds()
    }

    /// Peer ids participating in scenario ownership: ourselves plus every
    /// known remote, sorted.
    pub fn known_peer_ids(&self) -> Vec<u8> {
        let mut ids = vec![self.local_peer_id()];
        if let Some(endpoint) = self.endpoint.read().as_ref() {
            ids.extend(endpoint.peers.peer_ids());
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Mint a fresh locally-owned object id.
    pub fn allocate_object_id(&self) -> ObjectId {
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        ObjectId::new(self.local_peer_id(), serial)
    }

    pub(crate) fn set_next_serial(&self, serial: u32) {
        self.next_serial.store(serial, Ordering::Relaxed);
    }

    /// Insert a fully formed body.
    pub fn add_body(&self, body: Body) -> Option<BodyHandle> {
        self.bodies.add(body)
    }

    /// Queue a sphere spawn. Spawns stay queued until a scenario is
    /// loaded and the main thread pumps the queue between ticks.
    pub fn request_spawn(&self, request: SpawnRequest) {
        // The channel is unbounded and the world owns both ends, so this
        // cannot fail while the world is alive.
        let _ = self.spawn_tx.send(request);
    }

    pub fn queue_command(&self, command: Command) {
        self.commands.lock().push(command);
    }

    pub fn current_scenario(&self) -> Option<u8> {
        *self.current_scenario.lock()
    }

    pub(crate) fn set_current_scenario(&self, id: u8) {
        *self.current_scenario.lock() = Some(id);
    }

    /// Inbound object update. Our own updates echo back from peers that
    /// have not pruned us; feeding those into the queue would fight the
    /// integrator.
    pub fn handle_object_update(&self, update: ObjectUpdate) {
        if update.owner_peer_id == self.local_peer_id() {
            trace!(id = update.object_id, "discarding own object update");
            return;
        }
        self.queue_command(Command::ApplyRemote(update));
    }

    /// Inbound scenario switch. Switching to the scenario already loaded
    /// is a no-op.
    pub fn handle_scenario_change(&self, scenario_id: u8) {
        if self.current_scenario() == Some(scenario_id) {
            trace!(scenario_id, "scenario already active");
            return;
        }
        self.queue_command(Command::LoadScenario(scenario_id));
    }

    /// Drain deferred work: remote updates, scenario switches, then
    /// pending spawns. Called from the main thread between ticks.
    pub fn pump(&self) {
        let drained = std::mem::take(&mut *self.commands.lock());
        for command in drained {
            match command {
                Command::ApplyRemote(update) => self.apply_remote_update(update),
                Command::LoadScenario(id) => {
                    if self.load_scenario(id) {
                        self.publish_params();
                    }
                }
            }
        }

        if self.current_scenario().is_some() {
            while let Ok(request) = self.spawn_rx.try_recv() {
                self.spawn_now(request);
            }
        }
    }

    fn apply_remote_update(&self, update: ObjectUpdate) {
        let Some(handle) = self.bodies.find(ObjectId::from_raw(update.object_id)) else {
            // The sender is racing a scenario change we already applied.
            debug!(id = update.object_id, "update for unknown object dropped");
            return;
        };

        let mut body = handle.write();
        if body.is_owned_locally {
            return;
        }
        body.apply_remote_state(
            update.position,
            update.rotation,
            update.velocity,
            update.scale,
            self.now_secs(),
        );
    }

    fn spawn_now(&self, request: SpawnRequest) {
        let id = self.allocate_object_id();
        let mut body =
            Body::moving_sphere(request.position, request.radius, request.mass, request.material)
                .with_owner(id, self.local_peer_id());
        body.velocity = request.velocity;
        self.add_body(body);
    }

    /// Tear down and rebuild the body sets from a scenario definition.
    /// Returns false for an unknown id or the already-active scenario.
    pub fn load_scenario(&self, scenario_id: u8) -> bool {
        if self.current_scenario() == Some(scenario_id) {
            return false;
        }
        if !scenario::load(self, scenario_id) {
            return false;
        }
        info!(scenario_id, "scenario loaded");
        true
    }

    /// Local scenario switch (GUI or console): load it here, then tell
    /// every peer to follow and share our parameter state.
    pub fn switch_scenario(&self, scenario_id: u8) {
        if !self.load_scenario(scenario_id) {
            return;
        }
        if let Some(endpoint) = self.endpoint.read().as_ref() {
            endpoint.send_to_all_peers(Payload::ScenarioChange(ScenarioChange { scenario_id }));
        }
        self.publish_params();
    }

    /// Snapshot a body as the object-update message its peers will get.
    pub fn object_update_for(&self, body: &Body) -> ObjectUpdate {
        ObjectUpdate {
            object_id: body.object_id.raw(),
            position: body.position(),
            rotation: body.rotation_deg(),
            velocity: body.velocity,
            scale: body.scale(),
            owner_peer_id: body.owner_peer_id,
        }
    }

    /// Fan an owned body's state out to every known peer.
    pub fn publish_object_update(&self, update: ObjectUpdate) {
        if let Some(endpoint) = self.endpoint.read().as_ref() {
            endpoint.send_to_all_peers(Payload::ObjectUpdate(update));
        }
    }

    /// Share the current parameter knobs with every known peer.
    pub fn publish_params(&self) {
        if let Some(endpoint) = self.endpoint.read().as_ref() {
            endpoint.send_to_all_peers(Payload::GlobalState(GlobalState::capture(&self.params)));
        }
    }
}
