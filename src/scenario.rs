//! Built-in scenarios: fixed obstacle layouts, deterministic sphere spawn
//! lists and per-scenario parameter presets.
//!
//! Every peer materializes the same scenario, including bodies owned by
//! other peers: ownership of spawn entry `k` goes round-robin over the
//! sorted set of peers known at load time, and per-owner serials follow
//! list order, so all peers derive identical object ids without talking
//! to each other.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::physics::{Body, Collider, Material, ObjectId};
use crate::world::World;

/// A fixed obstacle in a scenario.
#[derive(Debug, Clone)]
pub struct FixedBody {
    pub collider: Collider,
    pub material: Material,
}

/// One sphere in a scenario's spawn list.
#[derive(Debug, Clone, Copy)]
pub struct SphereSpawn {
    pub position: Vec3,
    pub radius: f32,
    pub mass: f32,
    pub material: Material,
}

/// A complete scenario description.
#[derive(Debug, Clone)]
pub struct Definition {
    pub id: u8,
    pub name: &'static str,
    pub fixed: Vec<FixedBody>,
    pub spawns: Vec<SphereSpawn>,
    /// Gravity preset applied on load; the mass pile runs weightless.
    pub gravity_enabled: bool,
}

/// Ids of the built-in scenarios.
pub const SCENARIO_IDS: [u8; 3] = [1, 2, 3];

fn material_cycle(index: usize) -> Material {
    match index % 5 {
        0 => Material::Steel,
        1 => Material::Wood,
        2 => Material::Rubber,
        3 => Material::Plastic,
        _ => Material::Stone,
    }
}

/// Uniform x-z lattice of sphere spawns with a little deterministic
/// jitter, high enough above the floor to rain down.
fn sphere_rain(
    rng: &mut StdRng,
    count: usize,
    area_half: f32,
    min_radius: f32,
    max_radius: f32,
    height: f32,
) -> Vec<SphereSpawn> {
    let columns = (count as f32).sqrt().ceil() as usize;
    let spacing = (2.0 * area_half) / columns as f32;
    let origin = -area_half + spacing * 0.5;

    let mut spawns = Vec::with_capacity(count);
    for index in 0..count {
        let col = index % columns;
        let row = index / columns;
        let jitter = spacing * 0.15;
        let position = Vec3::new(
            origin + col as f32 * spacing + rng.gen_range(-jitter..=jitter),
            height + (row % 2) as f32 * max_radius * 2.5,
            origin + row as f32 * spacing + rng.gen_range(-jitter..=jitter),
        );
        spawns.push(SphereSpawn {
            position,
            radius: rng.gen_range(min_radius..=max_radius),
            mass: 1.0,
            material: material_cycle(index),
        });
    }
    spawns
}

/// Non-overlapping 3D lattice of small spheres filling the room, used by
/// the weightless mass pile.
fn sphere_lattice(count: usize, half_extent: f32, radius: f32) -> Vec<SphereSpawn> {
    let per_axis = ((count as f32).cbrt().ceil() as usize).max(2);
    let span = half_extent * 0.875;
    let spacing = span * 2.0 / (per_axis - 1) as f32;

    let mut spawns = Vec::with_capacity(count);
    'fill: for x in 0..per_axis {
        for y in 0..per_axis {
            for z in 0..per_axis {
                if spawns.len() == count {
                    break 'fill;
                }
                let position = Vec3::new(
                    -span + x as f32 * spacing,
                    -span + y as f32 * spacing,
                    -span + z as f32 * spacing,
                );
                spawns.push(SphereSpawn {
                    position,
                    radius,
                    mass: 1.0,
                    material: material_cycle(spawns.len()),
                });
            }
        }
    }
    spawns
}

/// Build a scenario definition. The layout depends only on the id and the
/// room size, so every peer builds the same one.
pub fn build(id: u8, half_extent: f32) -> Option<Definition> {
    let mut rng = StdRng::seed_from_u64(id as u64 * 7919);
    let floor = FixedBody {
        collider: Collider::plane(Vec3::new(0.0, -half_extent, 0.0), Vec3::Y),
        material: Material::Stone,
    };

    match id {
        1 => Some(Definition {
            id,
            name: "sphere drop",
            fixed: vec![floor],
            spawns: sphere_rain(&mut rng, 25, half_extent * 0.7, 0.15, 0.2, 1.5),
            gravity_enabled: true,
        }),
        2 => Some(Definition {
            id,
            name: "obstacle field",
            fixed: vec![
                floor,
                FixedBody {
                    collider: Collider::cube(
                        Vec3::new(-1.2, -2.4, -1.2),
                        Vec3::new(1.2, 1.2, 1.2),
                    ),
                    material: Material::Wood,
                },
                FixedBody {
                    collider: Collider::cube(Vec3::new(1.4, -2.6, 1.0), Vec3::new(0.8, 0.8, 0.8)),
                    material: Material::Wood,
                },
                FixedBody {
                    collider: Collider::cylinder(
                        Vec3::new(1.2, -1.5, -1.0),
                        Vec3::new(0.0, 0.0, 25.0),
                        0.35,
                        1.0,
                    ),
                    material: Material::Steel,
                },
                FixedBody {
                    collider: Collider::capsule(
                        Vec3::new(-1.0, -1.0, 1.3),
                        Vec3::new(30.0, 0.0, 0.0),
                        0.3,
                        0.8,
                    ),
                    material: Material::Rubber,
                },
            ],
            spawns: sphere_rain(&mut rng, 40, half_extent * 0.8, 0.1, 0.14, 1.8),
            gravity_enabled: true,
        }),
        3 => Some(Definition {
            id,
            name: "mass pile",
            fixed: vec![floor],
            spawns: sphere_lattice(500, half_extent, 0.05),
            gravity_enabled: false,
        }),
        _ => None,
    }
}

/// Ownership plan for a spawn list: `(owner, serial)` per entry, with
/// owners assigned round-robin and serials counted per owner in list
/// order.
fn assign_owners(spawn_count: usize, peer_ids: &[u8]) -> Vec<(u8, u32)> {
    let mut per_owner = vec![0u32; peer_ids.len()];
    (0..spawn_count)
        .map(|index| {
            let slot = index % peer_ids.len();
            let serial = per_owner[slot];
            per_owner[slot] += 1;
            (peer_ids[slot], serial)
        })
        .collect()
}

/// Replace the world's bodies with scenario `id` and apply its parameter
/// preset. Returns false when the id is unknown.
pub fn load(world: &World, id: u8) -> bool {
    let Some(definition) = build(id, world.config.half_extent) else {
        warn!(id, "unknown scenario");
        return false;
    };

    world.bodies.clear();

    let local = world.local_peer_id();
    let peer_ids = world.known_peer_ids();
    let owners = assign_owners(definition.spawns.len(), &peer_ids);

    let mut local_serials = 0u32;
    for (spawn, &(owner, serial)) in definition.spawns.iter().zip(&owners) {
        if owner == local {
            local_serials = local_serials.max(serial + 1);
        }
        world.add_body(
            Body::moving_sphere(spawn.position, spawn.radius, spawn.mass, spawn.material)
                .with_owner(ObjectId::new(owner, serial), local),
        );
    }

    // Locally minted ids (fixed bodies, later GUI spawns) continue after
    // this peer's scenario serials.
    world.set_next_serial(local_serials);

    for fixed in &definition.fixed {
        world.add_body(
            Body::fixed(fixed.collider, fixed.material)
                .with_owner(world.allocate_object_id(), local),
        );
    }

    world.params.set_gravity_enabled(definition.gravity_enabled);
    world.set_current_scenario(id);
    true
}
