//! The multi-threaded phased pipeline driving the simulation.
//!
//! A pool of workers executes the four collision/integration phases in
//! lockstep under a cancellable barrier, then sleeps out the remainder of
//! the fixed timestep. Worker 0 doubles as the resolution thread and the
//! tick-rate bookkeeper.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use crate::world::World;

use super::narrowphase;
use super::BodyHandle;

/// A reusable barrier that can be cancelled: `stop` wakes every parked
/// worker instead of leaving it stranded at an arrival point.
struct PhaseBarrier {
    count: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

#[derive(Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    cancelled: bool,
}

impl PhaseBarrier {
    fn new(count: usize) -> Self {
        Self {
            count,
            state: Mutex::new(BarrierState::default()),
            cvar: Condvar::new(),
        }
    }

    /// Block until all workers arrive. Returns `Some(true)` for the
    /// arrival that released the group, `Some(false)` for the rest, and
    /// `None` once the barrier is cancelled.
    fn wait(&self) -> Option<bool> {
        let mut state = self.state.lock();
        if state.cancelled {
            return None;
        }

        state.arrived += 1;
        if state.arrived == self.count {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cvar.notify_all();
            return Some(true);
        }

        let generation = state.generation;
        while state.generation == generation && !state.cancelled {
            self.cvar.wait(&mut state);
        }
        if state.cancelled {
            None
        } else {
            Some(false)
        }
    }

    fn cancel(&self) {
        self.state.lock().cancelled = true;
        self.cvar.notify_all();
    }
}

/// Per-tick state sampled once by the barrier leader so every worker acts
/// on identical inputs.
struct TickState {
    paused: bool,
    dt: f32,
    moving: Vec<BodyHandle>,
    fixed: Vec<BodyHandle>,
    ticks: u32,
    rate_mark: Instant,
}

struct Shared {
    world: Arc<World>,
    running: AtomicBool,
    barrier: PhaseBarrier,
    tick: Mutex<TickState>,
    /// One collision-pair list per worker, concatenated in worker order
    /// during resolution.
    pairs: Vec<Mutex<Vec<(BodyHandle, BodyHandle)>>>,
    pace_lock: Mutex<()>,
    pace_cvar: Condvar,
}

impl Shared {
    fn new(world: Arc<World>, workers: usize) -> Self {
        let mut pairs = Vec::with_capacity(workers);
        pairs.resize_with(workers, || Mutex::new(Vec::new()));
        Self {
            world,
            running: AtomicBool::new(true),
            barrier: PhaseBarrier::new(workers),
            tick: Mutex::new(TickState {
                paused: false,
                dt: 0.008,
                moving: Vec::new(),
                fixed: Vec::new(),
                ticks: 0,
                rate_mark: Instant::now(),
            }),
            pairs,
            pace_lock: Mutex::new(()),
            pace_cvar: Condvar::new(),
        }
    }
}

/// What a single barrier step did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// The pause flag was set; no phase ran.
    Paused,
    /// All four phases ran with this timestep.
    Stepped { dt: f32 },
}

fn slice_bounds(len: usize, workers: usize, worker: usize) -> (usize, usize) {
    let per_worker = len.div_ceil(workers);
    let start = (worker * per_worker).min(len);
    let end = ((worker + 1) * per_worker).min(len);
    (start, end)
}

/// Run one barrier-synchronized tick for worker `worker` of `workers`.
/// Returns `None` when the barrier has been cancelled by `stop`.
fn run_step(shared: &Shared, worker: usize, workers: usize) -> Option<StepOutcome> {
    let world = &shared.world;

    // Tick snapshot: the releasing arrival samples the pause flag, the
    // timestep and the body lists; the second arrival makes the sample
    // visible to everyone before any phase starts.
    if shared.barrier.wait()? {
        let mut tick = shared.tick.lock();
        tick.paused = world.params.paused();
        tick.dt = world.params.sim_dt();
        if tick.paused {
            // Don't hold body handles alive while spinning on pause.
            tick.moving.clear();
            tick.fixed.clear();
        } else {
            let (moving, fixed) = world.bodies.snapshot();
            tick.moving = moving;
            tick.fixed = fixed;

            tick.ticks += 1;
            let elapsed = tick.rate_mark.elapsed();
            if elapsed.as_secs_f32() >= 1.0 {
                world
                    .params
                    .set_actual_sim_hz(tick.ticks as f32 / elapsed.as_secs_f32());
                tick.ticks = 0;
                tick.rate_mark = Instant::now();
            }
        }
    }
    shared.barrier.wait()?;

    let (paused, dt, moving, fixed) = {
        let tick = shared.tick.lock();
        (tick.paused, tick.dt, tick.moving.clone(), tick.fixed.clone())
    };

    // Everyone read the same flag, so everyone skips together.
    if paused {
        return Some(StepOutcome::Paused);
    }

    // With nothing to simulate each worker still crosses every remaining
    // arrival; leaving early would strand the others at the barrier.
    if moving.is_empty() {
        for _ in 0..4 {
            shared.barrier.wait()?;
        }
        return Some(StepOutcome::Stepped { dt });
    }

    let grid = &world.grid;
    let (body_start, body_end) = slice_bounds(moving.len(), workers, worker);
    let (cell_start, cell_end) = slice_bounds(grid.cell_count(), workers, worker);

    // Phase 1: rebuild the grid.
    grid.clear_range(cell_start..cell_end);
    shared.barrier.wait()?;

    for index in body_start..body_end {
        let position = moving[index].read().position();
        grid.insert(index, position);
    }
    shared.barrier.wait()?;

    // Phase 2: detect collisions into this worker's pair list.
    {
        let mut pairs = shared.pairs[worker].lock();
        pairs.clear();
        let mut candidates = Vec::new();

        for index in body_start..body_end {
            let position = moving[index].read().position();

            // Moving vs moving through the grid neighborhood; i < j keeps
            // each pair unique across workers.
            candidates.clear();
            grid.for_each_neighbor(position, |other| {
                if index < other && other < moving.len() {
                    candidates.push(other);
                }
            });
            for &other in &candidates {
                let hit = {
                    let a = moving[index].read();
                    let b = moving[other].read();
                    narrowphase::contact(&a.collider, &b.collider).is_some()
                };
                if hit {
                    pairs.push((moving[index].clone(), moving[other].clone()));
                }
            }

            // Moving vs fixed by linear scan; the fixed set is small.
            for fixed_body in &fixed {
                let hit = {
                    let a = moving[index].read();
                    let b = fixed_body.read();
                    narrowphase::contact(&a.collider, &b.collider).is_some()
                };
                if hit {
                    pairs.push((moving[index].clone(), fixed_body.clone()));
                }
            }
        }
    }
    shared.barrier.wait()?;

    // Phase 3: worker 0 resolves the concatenated pair lists in worker
    // order. Single-threaded resolution avoids write contention and makes
    // the outcome deterministic for a fixed worker count.
    if worker == 0 {
        for list in &shared.pairs {
            let list = list.lock();
            for (a, b) in list.iter() {
                let mut body_a = a.write();
                let mut body_b = b.write();
                // Re-test: an earlier resolution this phase may have
                // already separated the pair.
                if let Some(hit) = narrowphase::contact(&body_a.collider, &body_b.collider) {
                    body_a.resolve_against(&mut body_b, hit.normal, hit.penetration, &world.params);
                }
            }
        }
    }
    shared.barrier.wait()?;

    // Phase 4: integrate owned bodies and publish their new state.
    let half_extent = world.config.half_extent;
    for index in body_start..body_end {
        let update = {
            let mut body = moving[index].write();
            if !body.is_owned_locally {
                continue;
            }
            body.integrate(dt, &world.params);
            body.clamp_to_bounds(half_extent);
            world.object_update_for(&body)
        };
        world.publish_object_update(update);
    }

    Some(StepOutcome::Stepped { dt })
}

fn worker_loop(shared: Arc<Shared>, worker: usize, workers: usize) {
    debug!(worker, "physics worker started");
    while shared.running.load(Ordering::Acquire) {
        let started = Instant::now();
        let Some(outcome) = run_step(&shared, worker, workers) else {
            break;
        };

        match outcome {
            StepOutcome::Paused => thread::yield_now(),
            StepOutcome::Stepped { dt } => {
                // Sleep out the rest of the timestep; an overlong step
                // just starts the next one immediately. The condvar wakes
                // early when stop is signalled.
                let deadline = started + Duration::from_secs_f32(dt);
                let mut guard = shared.pace_lock.lock();
                while shared.running.load(Ordering::Acquire) && Instant::now() < deadline {
                    shared.pace_cvar.wait_until(&mut guard, deadline);
                }
            }
        }
    }
    debug!(worker, "physics worker stopped");
}

/// Physics worker count for this machine: all cores except the ones
/// reserved for rendering and networking, but at least one.
pub fn default_worker_count(reserved_cores: usize) -> usize {
    let available = thread::available_parallelism().map_or(1, |n| n.get());
    available.saturating_sub(reserved_cores).max(1)
}

/// Handle to a running worker pool. Stops and joins on drop.
pub struct Scheduler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn `workers` physics threads ticking `world`.
    pub fn start(world: Arc<World>, workers: usize) -> std::io::Result<Self> {
        let workers = workers.max(1);
        let shared = Arc::new(Shared::new(world, workers));

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let shared = shared.clone();
            let handle = thread::Builder::new()
                .name(format!("physics-{worker}"))
                .spawn(move || worker_loop(shared, worker, workers))?;
            handles.push(handle);
        }

        debug!(workers, "physics pool started");
        Ok(Self {
            shared,
            workers: handles,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Signal every worker and join the pool. Workers parked at a barrier
    /// or in the pacing sleep wake immediately.
    pub fn stop(&mut self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.shared.barrier.cancel();
        self.shared.pace_cvar.notify_all();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("physics worker panicked");
            }
        }
        debug!("physics pool stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Single-threaded pipeline driver: runs the same four phases as the
/// pool, synchronously, one tick per call. Used headless and in tests
/// where deterministic tick counts matter.
pub struct Stepper {
    shared: Shared,
}

impl Stepper {
    pub fn new(world: Arc<World>) -> Self {
        Self {
            shared: Shared::new(world, 1),
        }
    }

    /// Run one tick on the calling thread.
    pub fn step(&self) -> StepOutcome {
        // A one-worker barrier never blocks, so the step cannot cancel.
        run_step(&self.shared, 0, 1).unwrap_or(StepOutcome::Paused)
    }
}
