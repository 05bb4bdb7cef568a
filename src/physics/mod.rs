//! CPU physics engine: analytic collision primitives, impulse response
//! and a multi-threaded fixed-timestep pipeline.
//!
//! # Architecture
//!
//! Every tick runs four phases across a pool of workers under a shared
//! barrier:
//!
//! 1. Rebuild the broad-phase grid (clear, then insert moving bodies)
//! 2. Detect collisions into per-worker pair lists (grid neighborhoods
//!    for moving-moving, a linear scan for moving-fixed)
//! 3. Resolve all pairs on a single worker, re-testing each pair so
//!    earlier resolutions are observed
//! 4. Integrate owned bodies, clamp them to the room and publish their
//!    state to peers
//!
//! Bodies live in two lists behind one reader-writer lock: the moving set
//! (spheres) and the fixed set (everything else). Workers snapshot owning
//! handles once per tick, so list mutations from the main thread never
//! invalidate a step in flight.

pub mod body;
pub mod collider;
pub mod grid;
pub mod material;
pub mod narrowphase;
pub mod scheduler;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

pub use body::{Body, IntegrationMethod, ObjectId};
pub use collider::{Collider, Shape, Transform};
pub use grid::UniformGrid;
pub use material::Material;
pub use narrowphase::{contact, Contact};
pub use scheduler::{default_worker_count, Scheduler, StepOutcome, Stepper};

/// Shared owning handle to a body. Snapshots of these keep bodies alive
/// for the duration of a tick regardless of list mutations.
pub type BodyHandle = Arc<RwLock<Body>>;

#[derive(Debug, Default)]
struct BodyLists {
    moving: Vec<BodyHandle>,
    fixed: Vec<BodyHandle>,
}

/// The moving and fixed body sets, guarded by a single reader-writer
/// lock. Writers are the main thread (spawns, scenario loads); readers
/// are the physics workers taking their per-tick snapshot.
#[derive(Debug, Default)]
pub struct BodyStore {
    lists: RwLock<BodyLists>,
}

impl BodyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a body into the moving or fixed list according to its
    /// `is_fixed` flag. A body whose object id is already present is
    /// rejected, keeping ids globally unique.
    pub fn add(&self, body: Body) -> Option<BodyHandle> {
        let mut lists = self.lists.write();
        let id = body.object_id;
        let duplicate = lists
            .moving
            .iter()
            .chain(lists.fixed.iter())
            .any(|b| b.read().object_id == id);
        if duplicate {
            warn!(id = id.raw(), "ignoring body with duplicate object id");
            return None;
        }

        let handle: BodyHandle = Arc::new(RwLock::new(body));
        if handle.read().is_fixed {
            lists.fixed.push(handle.clone());
        } else {
            lists.moving.push(handle.clone());
        }
        Some(handle)
    }

    /// Clone the current moving and fixed lists.
    pub fn snapshot(&self) -> (Vec<BodyHandle>, Vec<BodyHandle>) {
        let lists = self.lists.read();
        (lists.moving.clone(), lists.fixed.clone())
    }

    /// Look up a body by object id across both lists.
    pub fn find(&self, id: ObjectId) -> Option<BodyHandle> {
        let lists = self.lists.read();
        lists
            .moving
            .iter()
            .chain(lists.fixed.iter())
            .find(|b| b.read().object_id == id)
            .cloned()
    }

    /// Remove every body.
    pub fn clear(&self) {
        let mut lists = self.lists.write();
        lists.moving.clear();
        lists.fixed.clear();
    }

    pub fn moving_count(&self) -> usize {
        self.lists.read().moving.len()
    }

    pub fn fixed_count(&self) -> usize {
        self.lists.read().fixed.len()
    }
}
