//! Rigid bodies: kinematic state, integration, collision response and
//! remote-state smoothing.

use glam::{Mat4, Vec3};

use crate::params::SharedParams;

use super::collider::{Collider, Shape};
use super::material::{self, Material};

/// Per-step linear velocity damping factor.
const LINEAR_DAMPING: f32 = 0.998;
/// Per-step angular velocity damping factor.
const ANGULAR_DAMPING: f32 = 0.995;
/// Below this speed (linear and angular) a body is snapped to rest.
const SLEEP_EPSILON: f32 = 0.01;
/// Spin attenuation applied when converting angular velocity into an
/// Euler rotation delta.
const SPIN_SCALE: f32 = 0.1;
/// Velocity reflection factor for room-boundary bounces.
const BOUNCE_DAMPING: f32 = -0.4;
/// Allowed penetration before positional correction kicks in.
const PENETRATION_SLOP: f32 = 0.01;
/// Fraction of the remaining penetration removed per resolution.
const CORRECTION_PERCENT: f32 = 0.4;

/// Numerical integration scheme for moving bodies, switchable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrationMethod {
    #[default]
    SemiImplicitEuler,
    Rk4,
    Midpoint,
}

impl IntegrationMethod {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Rk4,
            2 => Self::Midpoint,
            _ => Self::SemiImplicitEuler,
        }
    }
}

/// Globally unique object identifier: high 8 bits are the owning peer id,
/// low 24 bits a per-peer counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    pub const SERIAL_BITS: u32 = 24;
    pub const SERIAL_MASK: u32 = (1 << Self::SERIAL_BITS) - 1;

    pub fn new(owner: u8, serial: u32) -> Self {
        Self(((owner as u32) << Self::SERIAL_BITS) | (serial & Self::SERIAL_MASK))
    }

    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn owner(self) -> u8 {
        (self.0 >> Self::SERIAL_BITS) as u8
    }

    pub fn serial(self) -> u32 {
        self.0 & Self::SERIAL_MASK
    }
}

/// A collider with physical state. Fixed bodies never move; moving bodies
/// are always spheres, integrated only by their owning peer.
#[derive(Debug, Clone)]
pub struct Body {
    pub collider: Collider,
    pub is_fixed: bool,
    mass: f32,
    inv_mass: f32,
    inv_inertia: f32,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    acceleration: Vec3,
    pub material: Material,
    pub integration_method: IntegrationMethod,
    pub object_id: ObjectId,
    pub owner_peer_id: u8,
    pub is_owned_locally: bool,
    world_matrix: Mat4,
    // Remote-body render smoothing: the two most recent replicated
    // positions and their arrival times.
    prev_render_pos: Vec3,
    curr_render_pos: Vec3,
    prev_ts: f64,
    curr_ts: f64,
}

impl Body {
    pub fn new(collider: Collider, is_fixed: bool, mass: f32, material: Material) -> Self {
        let position = collider.position();
        let world_matrix = collider.world_matrix();
        let mut body = Self {
            collider,
            is_fixed,
            mass: 0.0,
            inv_mass: 0.0,
            inv_inertia: 0.0,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            material,
            integration_method: IntegrationMethod::default(),
            object_id: ObjectId::new(0, 0),
            owner_peer_id: 0,
            is_owned_locally: true,
            world_matrix,
            prev_render_pos: position,
            curr_render_pos: position,
            prev_ts: 0.0,
            curr_ts: 0.0,
        };
        body.set_mass(mass);
        body
    }

    /// Fixed obstacle: immovable, skipped by the integrator.
    pub fn fixed(collider: Collider, material: Material) -> Self {
        Self::new(collider, true, 1.0, material)
    }

    /// Locally spawned moving sphere.
    pub fn moving_sphere(position: Vec3, radius: f32, mass: f32, material: Material) -> Self {
        Self::new(Collider::sphere(position, radius), false, mass, material)
    }

    /// Tag this body with its id and owner, caching the local-ownership
    /// flag.
    pub fn with_owner(mut self, object_id: ObjectId, local_peer_id: u8) -> Self {
        self.object_id = object_id;
        self.owner_peer_id = object_id.owner();
        self.is_owned_locally = object_id.owner() == local_peer_id;
        self
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    pub fn inv_inertia(&self) -> f32 {
        self.inv_inertia
    }

    /// Set the mass, recomputing the inverse mass and, for moving spheres,
    /// the inverse moment of inertia (solid sphere: 2/5 m r^2).
    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass;
        self.inv_mass = if !self.is_fixed && mass > 1e-6 {
            1.0 / mass
        } else {
            0.0
        };

        self.inv_inertia = 0.0;
        if !self.is_fixed && self.collider.shape == Shape::Sphere {
            let radius = self.collider.radius();
            if mass > 1e-6 && radius > 1e-6 {
                let inertia = 0.4 * mass * radius * radius;
                self.inv_inertia = 1.0 / inertia;
            }
        }
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.collider.position()
    }

    #[inline]
    pub fn rotation_deg(&self) -> Vec3 {
        self.collider.transform.rotation_deg
    }

    #[inline]
    pub fn scale(&self) -> Vec3 {
        self.collider.transform.scale
    }

    /// Cached local-to-world matrix, refreshed by integration and remote
    /// updates.
    pub fn world_matrix(&self) -> Mat4 {
        self.world_matrix
    }

    fn step_semi_implicit_euler(&mut self, dt: f32) {
        self.velocity += self.acceleration * dt;
        self.collider.transform.position += self.velocity * dt;
    }

    fn step_midpoint(&mut self, dt: f32) {
        let mid_velocity = self.velocity + self.acceleration * (0.5 * dt);
        self.collider.transform.position += mid_velocity * dt;
        self.velocity += self.acceleration * dt;
    }

    fn step_rk4(&mut self, dt: f32) {
        // Acceleration does not depend on state, so every slope shares it.
        let k1_v = self.velocity;
        let k2_v = self.velocity + self.acceleration * (0.5 * dt);
        let k3_v = self.velocity + self.acceleration * (0.5 * dt);
        let k4_v = self.velocity + self.acceleration * dt;

        self.velocity += self.acceleration * dt;
        self.collider.transform.position +=
            (k1_v + k2_v * 2.0 + k3_v * 2.0 + k4_v) * (dt / 6.0);
    }

    /// Advance this body by one fixed step. Fixed bodies are untouched.
    pub fn integrate(&mut self, dt: f32, params: &SharedParams) {
        if self.is_fixed {
            return;
        }

        self.acceleration = Vec3::new(0.0, params.effective_gravity_y(), 0.0);
        self.integration_method = params.integration_method();

        match self.integration_method {
            IntegrationMethod::SemiImplicitEuler => self.step_semi_implicit_euler(dt),
            IntegrationMethod::Rk4 => self.step_rk4(dt),
            IntegrationMethod::Midpoint => self.step_midpoint(dt),
        }

        self.velocity *= LINEAR_DAMPING;
        self.angular_velocity *= ANGULAR_DAMPING;

        // Snap the slowest bodies to rest so they stop jittering.
        if self.velocity.length_squared() < SLEEP_EPSILON * SLEEP_EPSILON
            && self.angular_velocity.length_squared() < SLEEP_EPSILON * SLEEP_EPSILON
        {
            self.velocity = Vec3::ZERO;
            self.angular_velocity = Vec3::ZERO;
        }

        if self.inv_inertia > 0.0 {
            let delta = self.angular_velocity * (dt * SPIN_SCALE);
            self.collider.transform.rotation_deg += Vec3::new(
                delta.x.to_degrees(),
                delta.y.to_degrees(),
                delta.z.to_degrees(),
            );
        }

        self.world_matrix = self.collider.world_matrix();
    }

    /// Keep a moving sphere inside the cubic room `[-half_extent,
    /// half_extent]^3`, reflecting the velocity component that pushed it
    /// out. Only reacts when the body is still moving outward, so resting
    /// bodies stay asleep.
    pub fn clamp_to_bounds(&mut self, half_extent: f32) {
        if self.is_fixed || self.collider.shape != Shape::Sphere {
            return;
        }

        let radius = self.collider.radius();
        let min = -half_extent + radius;
        let max = half_extent - radius;

        let mut position = self.collider.transform.position;
        for axis in 0..3 {
            if position[axis] < min && self.velocity[axis] < 0.0 {
                position[axis] = min;
                self.velocity[axis] *= BOUNCE_DAMPING;
            } else if position[axis] > max && self.velocity[axis] > 0.0 {
                position[axis] = max;
                self.velocity[axis] *= BOUNCE_DAMPING;
            }
        }
        self.collider.transform.position = position;
    }

    /// Resolve a detected contact between this body and `other`. The
    /// normal points from `other` toward `self`.
    ///
    /// Only the owner of `self` resolves; remote peers will receive the
    /// authoritative outcome instead. Restitution and friction come from
    /// the global overrides when non-negative, else the material tables.
    pub fn resolve_against(
        &mut self,
        other: &mut Body,
        normal: Vec3,
        penetration: f32,
        params: &SharedParams,
    ) {
        if !self.is_owned_locally {
            return;
        }
        if self.is_fixed && other.is_fixed {
            return;
        }

        let inv_a = self.inv_mass;
        let inv_b = other.inv_mass;
        let inv_sum = inv_a + inv_b;
        if inv_sum <= 1e-6 {
            return;
        }

        // Restitution impulse.
        let v_rel = self.velocity - other.velocity;
        let v_n = v_rel.dot(normal);
        if v_n > 0.0 {
            return; // Already separating.
        }

        let restitution = {
            let global = params.elasticity();
            if global >= 0.0 {
                global
            } else {
                material::restitution(self.material, other.material)
            }
        };

        let j_n = -(1.0 + restitution) * v_n / inv_sum;
        let normal_impulse = normal * j_n;
        self.velocity += normal_impulse * inv_a;
        other.velocity -= normal_impulse * inv_b;

        // Friction impulse on the updated relative velocity.
        let v_rel = self.velocity - other.velocity;
        let tangent_vel = v_rel - normal * v_rel.dot(normal);
        let mut friction_impulse = Vec3::ZERO;

        if tangent_vel.length_squared() > 1e-6 {
            let tangent = tangent_vel.normalize();
            let j_t = -v_rel.dot(tangent) / inv_sum;

            let mu_s = {
                let global = params.static_friction();
                if global >= 0.0 {
                    global
                } else {
                    material::static_friction(self.material, other.material)
                }
            };
            let mu_d = {
                let global = params.dynamic_friction();
                if global >= 0.0 {
                    global
                } else {
                    material::dynamic_friction(self.material, other.material)
                }
            };

            // Static friction holds while the required impulse stays
            // inside the cone; otherwise the contact slides.
            friction_impulse = if j_t.abs() < mu_s * j_n {
                tangent * j_t
            } else {
                tangent * (-mu_d * j_n)
            };

            self.velocity += friction_impulse * inv_a;
            other.velocity -= friction_impulse * inv_b;
        }

        // Friction torque spins the spheres.
        if friction_impulse.length_squared() > 1e-6 {
            if self.inv_inertia > 0.0 {
                let arm = -normal * self.collider.radius();
                self.angular_velocity += arm.cross(friction_impulse) * self.inv_inertia;
            }
            if other.inv_inertia > 0.0 {
                let arm = normal * other.collider.radius();
                other.angular_velocity -= arm.cross(friction_impulse) * other.inv_inertia;
            }
        }

        // Positional correction removes most of the remaining overlap
        // without adding energy.
        let correction =
            normal * ((penetration - PENETRATION_SLOP).max(0.0) / inv_sum * CORRECTION_PERCENT);
        self.collider.transform.position += correction * inv_a;
        other.collider.transform.position -= correction * inv_b;
    }

    /// Overwrite this body's replicated state with an authoritative update
    /// from its owning peer. Shifts the current render sample into the
    /// previous slot for interpolation.
    pub fn apply_remote_state(
        &mut self,
        position: Vec3,
        rotation_deg: Vec3,
        velocity: Vec3,
        scale: Vec3,
        now_secs: f64,
    ) {
        if self.curr_ts == 0.0 {
            self.prev_render_pos = position;
            self.prev_ts = now_secs;
        } else {
            self.prev_render_pos = self.curr_render_pos;
            self.prev_ts = self.curr_ts;
        }
        self.curr_render_pos = position;
        self.curr_ts = now_secs;

        self.collider.transform.position = position;
        self.collider.transform.rotation_deg = rotation_deg;
        self.collider.transform.scale = scale;
        self.velocity = velocity;
        self.world_matrix = self.collider.world_matrix();
    }

    /// Position to render this body at, smoothing between the two most
    /// recent replicated samples and extrapolating past the newest one.
    pub fn smoothed_position(&self, render_time: f64, paused: bool) -> Vec3 {
        if paused || self.curr_ts == 0.0 {
            return self.curr_render_pos;
        }

        let delta = self.curr_ts - self.prev_ts;
        if delta <= 0.0 {
            return self.curr_render_pos;
        }

        let t = ((render_time - self.prev_ts) / delta) as f32;
        if t < 0.0 {
            self.prev_render_pos
        } else if t <= 1.0 {
            self.prev_render_pos + (self.curr_render_pos - self.prev_render_pos) * t
        } else {
            // Extrapolate with the velocity inferred from the last two
            // samples, until the next update lands.
            let inferred = (self.curr_render_pos - self.prev_render_pos) / delta as f32;
            let extra = (render_time - self.curr_ts) as f32;
            self.curr_render_pos + inferred * extra
        }
    }
}
