//! Shoal
//!
//! A distributed, real-time rigid-body simulator: spheres and simple
//! static shapes in a cubic room, replicated across LAN peers over UDP
//! broadcast. Every moving body is owned by exactly one peer, which
//! integrates it and publishes its state; everyone else renders smoothed
//! remote copies.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! 1. **config** - process-start constants (room size, ports, frequencies)
//! 2. **params** - runtime knobs, one atomic per knob, replicated as a unit
//! 3. **physics** - collision primitives, bodies, broad-phase grid and the
//!    barrier-phased worker pool
//! 4. **net** - wire codec, peer discovery and replication threads
//! 5. **scenario** - built-in fixed layouts and deterministic spawn lists
//! 6. **world** - the explicit context tying all of the above together

pub mod config;
pub mod net;
pub mod params;
pub mod physics;
pub mod scenario;
pub mod world;

// Re-export commonly used types
pub use config::SimConfig;
pub use params::SharedParams;

pub use physics::{
    contact, default_worker_count, Body, BodyHandle, BodyStore, Collider, Contact,
    IntegrationMethod, Material, ObjectId, Scheduler, Shape, StepOutcome, Stepper, Transform,
    UniformGrid,
};

pub use net::{
    peer_tint, Endpoint, GlobalState, Message, NetError, ObjectUpdate, Payload, PeerAnnounce,
    PeerTable, Replicator, ScenarioChange, MAX_DATAGRAM, PEER_TINTS,
};

pub use scenario::{Definition, FixedBody, SphereSpawn, SCENARIO_IDS};
pub use world::{Clock, Command, SpawnRequest, World};

// Re-export glam for convenience
pub use glam;
