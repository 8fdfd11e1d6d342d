//! Fluid frame step: substepped collision and integration.
//!
//! One call to [`step_frame`] advances every pool by a clamped frame delta:
//!
//! ```text
//! for each substep:
//!     build buckets -> terrain contacts -> particle pairs -> integrate
//! refresh world matrices
//! count down portal immunity (full frame delta)
//! ```

use crate::config::{FluidParams, SimConfig};
use crate::fluid::{FluidPools, FluidType};
use crate::spatial::ParticleBuckets;
use crate::systems::collision::{resolve_particle_pairs, resolve_terrain_contacts, CollisionStats};
use crate::terrain::TerrainLayers;
use bevy_ecs::prelude::*;
use glam::Vec2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Resource containing the raw delta time for the current frame.
#[derive(Resource, Default)]
pub struct DeltaTime(pub f32);

/// Random source shared by every system.
#[derive(Resource, Debug)]
pub struct SimRng(pub SmallRng);

impl SimRng {
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self(SmallRng::seed_from_u64(seed)),
            None => Self(SmallRng::from_entropy()),
        }
    }
}

/// Apply gravity and the optional velocity kick, move, then zero slow particles.
pub fn integrate(pools: &mut FluidPools, dt: f32, params: &FluidParams, rng: &mut impl Rng) {
    for kind in FluidType::ALL {
        let gravity = pools.type_config(kind).gravity;
        for particle in pools.pool_mut(kind).iter_mut() {
            particle.velocity.y += gravity * dt;
            if params.integration_jitter > 0.0 {
                let kick = Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0));
                particle.velocity += kick * dt * params.integration_jitter;
            }
            particle.transform.position += particle.velocity * dt;
            if particle.velocity.length_squared() < params.stop_speed_sq {
                particle.velocity = Vec2::ZERO;
            }
        }
    }
}

/// Advance every pool by one frame.
///
/// Particles are bucketed on the terrain grid, so with no terrain layer
/// loaded neither terrain contacts nor particle pairs are resolved and
/// particles only integrate.
///
/// Resting particles do not reach zero velocity when one substep of gravity
/// exceeds the stop threshold (the default does). Their speed stays within
/// one frame of gravity instead.
pub fn step_frame(
    dt: f32,
    config: &SimConfig,
    layers: &TerrainLayers,
    pools: &mut FluidPools,
    rng: &mut impl Rng,
    stats: &mut CollisionStats,
) {
    let dt = config.clamp_dt(dt);
    if dt > 0.0 {
        let substeps = config.substeps.max(1);
        let sub_dt = dt / substeps as f32;
        for _ in 0..substeps {
            if let Some(geometry) = layers.geometry() {
                let buckets = ParticleBuckets::build(geometry, pools);
                resolve_terrain_contacts(&buckets, layers, pools, &config.collision, rng, stats);
                resolve_particle_pairs(&buckets, pools, &config.collision, rng, stats);
            }
            integrate(pools, sub_dt, &config.fluid, rng);
        }
    }
    pools.refresh_transforms();
    pools.tick_iframes(dt);
}

/// System wrapper around [`step_frame`]. Counters are reset every frame.
pub fn fluid_step_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    layers: Res<TerrainLayers>,
    mut pools: ResMut<FluidPools>,
    mut rng: ResMut<SimRng>,
    mut stats: ResMut<CollisionStats>,
) {
    stats.reset();
    step_frame(dt.0, &config, &layers, &mut pools, &mut rng.0, &mut stats);
    log::trace!(
        "fluid step: {} particles, {} terrain contacts, {} pair contacts",
        pools.total_count(),
        stats.terrain_contacts,
        stats.pair_contacts
    );
}
