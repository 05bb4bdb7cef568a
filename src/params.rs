//! Runtime-tunable simulation parameters shared by every thread.
//!
//! Each knob is an independent atomic: readers may observe updates to
//! different knobs out of order, which is fine because no step requires a
//! consistent snapshot across knobs. Negative elasticity/friction values
//! are sentinels meaning "use the per-material lookup tables".

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::config::SimConfig;
use crate::physics::IntegrationMethod;

/// An `f32` stored in an `AtomicU32` through its bit pattern.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Global physics and pacing knobs.
#[derive(Debug)]
pub struct SharedParams {
    paused: AtomicBool,
    gravity_enabled: AtomicBool,
    gravity_y: AtomicF32,
    /// Global restitution override; negative = use material tables.
    elasticity: AtomicF32,
    /// Global static friction override; negative = use material tables.
    static_friction: AtomicF32,
    /// Global dynamic friction override; negative = use material tables.
    dynamic_friction: AtomicF32,
    target_sim_hz: AtomicF32,
    target_net_hz: AtomicF32,
    target_gfx_hz: AtomicF32,
    actual_sim_hz: AtomicF32,
    actual_net_hz: AtomicF32,
    actual_gfx_hz: AtomicF32,
    integration_method: AtomicU8,
}

impl SharedParams {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            paused: AtomicBool::new(false),
            gravity_enabled: AtomicBool::new(true),
            gravity_y: AtomicF32::new(-9.81),
            elasticity: AtomicF32::new(-1.0),
            static_friction: AtomicF32::new(-1.0),
            dynamic_friction: AtomicF32::new(-1.0),
            target_sim_hz: AtomicF32::new(config.target_sim_hz),
            target_net_hz: AtomicF32::new(config.target_net_hz),
            target_gfx_hz: AtomicF32::new(config.target_gfx_hz),
            actual_sim_hz: AtomicF32::new(0.0),
            actual_net_hz: AtomicF32::new(0.0),
            actual_gfx_hz: AtomicF32::new(0.0),
            integration_method: AtomicU8::new(IntegrationMethod::SemiImplicitEuler as u8),
        }
    }

    pub fn paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    pub fn gravity_enabled(&self) -> bool {
        self.gravity_enabled.load(Ordering::Relaxed)
    }

    pub fn set_gravity_enabled(&self, enabled: bool) {
        self.gravity_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn gravity_y(&self) -> f32 {
        self.gravity_y.load()
    }

    pub fn set_gravity_y(&self, value: f32) {
        self.gravity_y.store(value);
    }

    /// Vertical acceleration applied to moving bodies this step.
    pub fn effective_gravity_y(&self) -> f32 {
        if self.gravity_enabled() {
            self.gravity_y()
        } else {
            0.0
        }
    }

    pub fn elasticity(&self) -> f32 {
        self.elasticity.load()
    }

    pub fn set_elasticity(&self, value: f32) {
        self.elasticity.store(value);
    }

    pub fn static_friction(&self) -> f32 {
        self.static_friction.load()
    }

    pub fn set_static_friction(&self, value: f32) {
        self.static_friction.store(value);
    }

    pub fn dynamic_friction(&self) -> f32 {
        self.dynamic_friction.load()
    }

    pub fn set_dynamic_friction(&self, value: f32) {
        self.dynamic_friction.store(value);
    }

    pub fn target_sim_hz(&self) -> f32 {
        self.target_sim_hz.load()
    }

    pub fn set_target_sim_hz(&self, hz: f32) {
        self.target_sim_hz.store(hz);
    }

    pub fn target_net_hz(&self) -> f32 {
        self.target_net_hz.load()
    }

    pub fn set_target_net_hz(&self, hz: f32) {
        self.target_net_hz.store(hz);
    }

    pub fn target_gfx_hz(&self) -> f32 {
        self.target_gfx_hz.load()
    }

    pub fn set_target_gfx_hz(&self, hz: f32) {
        self.target_gfx_hz.store(hz);
    }

    pub fn actual_sim_hz(&self) -> f32 {
        self.actual_sim_hz.load()
    }

    pub fn set_actual_sim_hz(&self, hz: f32) {
        self.actual_sim_hz.store(hz);
    }

    pub fn actual_net_hz(&self) -> f32 {
        self.actual_net_hz.load()
    }

    pub fn set_actual_net_hz(&self, hz: f32) {
        self.actual_net_hz.store(hz);
    }

    pub fn actual_gfx_hz(&self) -> f32 {
        self.actual_gfx_hz.load()
    }

    pub fn set_actual_gfx_hz(&self, hz: f32) {
        self.actual_gfx_hz.store(hz);
    }

    pub fn integration_method(&self) -> IntegrationMethod {
        IntegrationMethod::from_u8(self.integration_method.load(Ordering::Relaxed))
    }

    pub fn set_integration_method(&self, method: IntegrationMethod) {
        self.integration_method.store(method as u8, Ordering::Relaxed);
    }

    /// Fixed timestep derived from the target simulation frequency.
    pub fn sim_dt(&self) -> f32 {
        1.0 / self.target_sim_hz().max(1.0)
    }
}

impl Default for SharedParams {
    fn default() -> Self {
        Self::new(&SimConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_f32_roundtrip() {
        let value = AtomicF32::new(-9.81);
        assert_eq!(value.load(), -9.81);
        value.store(3.25);
        assert_eq!(value.load(), 3.25);
    }

    #[test]
    fn test_defaults() {
        let params = SharedParams::default();
        assert!(!params.paused());
        assert!(params.gravity_enabled());
        assert_eq!(params.gravity_y(), -9.81);
        assert!(params.elasticity() < 0.0);
        assert!(params.static_friction() < 0.0);
        assert!(params.dynamic_friction() < 0.0);
        assert_eq!(params.target_sim_hz(), 125.0);
        assert_eq!(
            params.integration_method(),
            IntegrationMethod::SemiImplicitEuler
        );
    }

    #[test]
    fn test_gravity_gate() {
        let params = SharedParams::default();
        assert_eq!(params.effective_gravity_y(), -9.81);
        params.set_gravity_enabled(false);
        assert_eq!(params.effective_gravity_y(), 0.0);
    }

    #[test]
    fn test_sim_dt() {
        let params = SharedParams::default();
        params.set_target_sim_hz(125.0);
        assert!((params.sim_dt() - 0.008).abs() < 1e-6);
        // A nonsense frequency must not produce a nonsense timestep.
        params.set_target_sim_hz(0.0);
        assert_eq!(params.sim_dt(), 1.0);
    }
}
