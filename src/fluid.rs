//! Fluid particles and their per-type pools.
//!
//! Each fluid type owns a contiguous pool. Particles are addressed by a
//! [`ParticleHandle`] (type plus pool index) which is only valid until the
//! next removal from that pool.

use crate::components::{Rgba, Transform};
use crate::config::FluidParams;
use bevy_ecs::prelude::*;
use glam::Vec2;
use serde::{Deserialize, Serialize};

pub const FLUID_TYPE_COUNT: usize = 2;

/// Kind of fluid. Each kind has its own pool and physics settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FluidType {
    Water,
    Lava,
}

impl FluidType {
    pub const ALL: [FluidType; FLUID_TYPE_COUNT] = [FluidType::Water, FluidType::Lava];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            FluidType::Water => 0,
            FluidType::Lava => 1,
        }
    }

    pub fn default_color(self) -> Rgba {
        match self {
            FluidType::Water => Rgba::rgb(0.0, 0.5, 1.0),
            FluidType::Lava => Rgba::rgb(1.0, 0.2, 0.0),
        }
    }
}

/// Per-type physics and appearance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluidTypeConfig {
    pub gravity: f32,
    pub color: Rgba,
}

/// Stable ordinal of a live particle. Orders by type, then pool index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleHandle {
    pub kind: FluidType,
    pub index: u32,
}

impl ParticleHandle {
    pub fn new(kind: FluidType, index: usize) -> Self {
        Self {
            kind,
            index: index as u32,
        }
    }
}

/// A single fluid particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluidParticle {
    /// Render transform. Scale is the spawn diameter.
    pub transform: Transform,
    pub velocity: Vec2,
    /// Collision radius.
    pub radius: f32,
    pub kind: FluidType,
    /// Set after a teleport; portals ignore the particle while it lasts.
    pub portal_iframe: bool,
    pub iframe_timer: f32,
    pub iframe_duration: f32,
}

impl FluidParticle {
    pub fn new(kind: FluidType, position: Vec2, spawn_radius: f32, params: &FluidParams) -> Self {
        Self {
            transform: Transform::new(position, Vec2::splat(spawn_radius * 2.0), 0.0),
            velocity: Vec2::ZERO,
            radius: spawn_radius * params.collider_shrink,
            kind,
            portal_iframe: false,
            iframe_timer: params.iframe_duration,
            iframe_duration: params.iframe_duration,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.transform.position
    }

    /// Start the post-teleport immunity window.
    pub fn start_iframe(&mut self) {
        self.portal_iframe = true;
        self.iframe_timer = self.iframe_duration;
    }

    /// Count down the immunity window and clear it once it expires.
    pub fn tick_iframe(&mut self, dt: f32) {
        if !self.portal_iframe {
            return;
        }
        self.iframe_timer -= dt;
        if self.iframe_timer <= 0.0 {
            self.portal_iframe = false;
            self.iframe_timer = self.iframe_duration;
        }
    }
}

/// All fluid pools of the running level.
#[derive(Resource, Debug, Clone)]
pub struct FluidPools {
    pools: [Vec<FluidParticle>; FLUID_TYPE_COUNT],
    types: [FluidTypeConfig; FLUID_TYPE_COUNT],
    params: FluidParams,
}

impl Default for FluidPools {
    fn default() -> Self {
        Self::new(&FluidParams::default())
    }
}

impl FluidPools {
    pub fn new(params: &FluidParams) -> Self {
        let types = FluidType::ALL.map(|kind| FluidTypeConfig {
            gravity: params.gravity,
            color: kind.default_color(),
        });
        Self {
            pools: std::array::from_fn(|_| Vec::with_capacity(params.pool_capacity)),
            types,
            params: params.clone(),
        }
    }

    /// Override gravity for one fluid type.
    pub fn set_type_gravity(&mut self, kind: FluidType, gravity: f32) {
        self.types[kind.index()].gravity = gravity;
    }

    pub fn type_config(&self, kind: FluidType) -> &FluidTypeConfig {
        &self.types[kind.index()]
    }

    pub fn spawn(&mut self, kind: FluidType, position: Vec2, spawn_radius: f32) -> ParticleHandle {
        let pool = &mut self.pools[kind.index()];
        pool.push(FluidParticle::new(kind, position, spawn_radius, &self.params));
        ParticleHandle::new(kind, pool.len() - 1)
    }

    /// Spawn with an initial velocity.
    pub fn spawn_moving(
        &mut self,
        kind: FluidType,
        position: Vec2,
        spawn_radius: f32,
        velocity: Vec2,
    ) -> ParticleHandle {
        let handle = self.spawn(kind, position, spawn_radius);
        self.pools[kind.index()][handle.index as usize].velocity = velocity;
        handle
    }

    pub fn pool(&self, kind: FluidType) -> &[FluidParticle] {
        &self.pools[kind.index()]
    }

    pub fn pool_mut(&mut self, kind: FluidType) -> &mut Vec<FluidParticle> {
        &mut self.pools[kind.index()]
    }

    pub fn count(&self, kind: FluidType) -> usize {
        self.pools[kind.index()].len()
    }

    pub fn total_count(&self) -> usize {
        self.pools.iter().map(Vec::len).sum()
    }

    pub fn get(&self, handle: ParticleHandle) -> Option<&FluidParticle> {
        self.pools[handle.kind.index()].get(handle.index as usize)
    }

    pub fn get_mut(&mut self, handle: ParticleHandle) -> Option<&mut FluidParticle> {
        self.pools[handle.kind.index()].get_mut(handle.index as usize)
    }

    /// Two distinct particles borrowed mutably at once.
    pub fn pair_mut(
        &mut self,
        a: ParticleHandle,
        b: ParticleHandle,
    ) -> Option<(&mut FluidParticle, &mut FluidParticle)> {
        if a == b {
            return None;
        }
        let (ka, kb) = (a.kind.index(), b.kind.index());
        let (ia, ib) = (a.index as usize, b.index as usize);

        if ka == kb {
            let pool = &mut self.pools[ka];
            if ia.max(ib) >= pool.len() {
                return None;
            }
            if ia < ib {
                let (lo, hi) = pool.split_at_mut(ib);
                Some((&mut lo[ia], &mut hi[0]))
            } else {
                let (lo, hi) = pool.split_at_mut(ia);
                Some((&mut hi[0], &mut lo[ib]))
            }
        } else {
            let (lo, hi) = self.pools.split_at_mut(ka.max(kb));
            let (pool_a, pool_b) = if ka < kb {
                (&mut lo[ka], &mut hi[0])
            } else {
                (&mut hi[0], &mut lo[kb])
            };
            Some((pool_a.get_mut(ia)?, pool_b.get_mut(ib)?))
        }
    }

    /// Every live particle with its handle, pool by pool.
    pub fn iter(&self) -> impl Iterator<Item = (ParticleHandle, &FluidParticle)> {
        FluidType::ALL.into_iter().flat_map(move |kind| {
            self.pools[kind.index()]
                .iter()
                .enumerate()
                .map(move |(i, p)| (ParticleHandle::new(kind, i), p))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FluidParticle> {
        self.pools.iter_mut().flat_map(|pool| pool.iter_mut())
    }

    /// Remove every particle matching `consume` with swap-removal.
    ///
    /// The element swapped into a freed slot is tested at the same index, so
    /// no particle is skipped or tested twice. Pool order is not preserved.
    /// Returns the number removed.
    pub fn swap_remove_where(
        &mut self,
        kind: FluidType,
        mut consume: impl FnMut(&FluidParticle) -> bool,
    ) -> usize {
        let pool = &mut self.pools[kind.index()];
        let mut removed = 0;
        let mut i = 0;
        while i < pool.len() {
            if consume(&pool[i]) {
                pool.swap_remove(i);
                removed += 1;
            } else {
                i += 1;
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        for pool in &mut self.pools {
            pool.clear();
        }
    }

    /// Refresh every particle's world matrix.
    pub fn refresh_transforms(&mut self) {
        for particle in self.iter_mut() {
            particle.transform.refresh();
        }
    }

    /// Advance every particle's portal immunity timer.
    pub fn tick_iframes(&mut self, dt: f32) {
        for particle in self.iter_mut() {
            particle.tick_iframe(dt);
        }
    }
}
