//! Collision passes run once per substep.
//!
//! 1. Terrain pass: every bucketed particle is tested against the terrain
//!    colliders of its 3x3 cell neighbourhood across all layers. The first
//!    colliding collider wins and at most one contact is resolved per
//!    particle per substep.
//! 2. Pair pass: every occupied bucket is paired with each bucket of its 3x3
//!    neighbourhood. A pair `(a, b)` is resolved only when `a < b`, so every
//!    unordered pair in adjacent buckets is resolved exactly once.

use crate::collider::Contact;
use crate::config::CollisionTuning;
use crate::fluid::{FluidParticle, FluidPools};
use crate::spatial::ParticleBuckets;
use crate::terrain::TerrainLayers;
use bevy_ecs::prelude::*;
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Floor on squared pair distance before normalising.
const MIN_PAIR_DIST_SQ: f32 = 0.0001;

/// Collision counters for the current frame.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionStats {
    /// Terrain contacts resolved.
    pub terrain_contacts: u64,
    /// Calls to the pair resolver.
    pub pair_checks: u64,
    /// Pair calls that found an overlap.
    pub pair_contacts: u64,
}

impl CollisionStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// TERRAIN CONTACTS
// ============================================================================

/// Push a particle out along the contact normal and remove its inward velocity.
///
/// The push is `penetration + slop`, never negative and capped at a fraction
/// of the particle radius. Tangential motion survives with mild damping.
pub fn push_out_and_slide(
    particle: &mut FluidParticle,
    contact: Contact,
    tuning: &CollisionTuning,
    rng: &mut impl Rng,
) {
    let max_push = particle.radius * tuning.max_push_fraction;
    let push = (contact.penetration + tuning.push_slop).max(0.0).min(max_push);
    particle.transform.position += contact.normal * push;

    let vn = particle.velocity.dot(contact.normal);
    if vn < 0.0 {
        particle.velocity -= contact.normal * vn;
        let damping = if tuning.damping_max > tuning.damping_min {
            rng.gen_range(tuning.damping_min..=tuning.damping_max)
        } else {
            tuning.damping_min
        };
        particle.velocity *= damping;
    }
}

/// First terrain contact for a circle in the neighbourhood of `cell`.
fn first_terrain_contact(
    layers: &TerrainLayers,
    buckets: &ParticleBuckets,
    cell: usize,
    center: Vec2,
    radius: f32,
) -> Option<Contact> {
    buckets.neighborhood(cell).find_map(|neighbor| {
        layers.layers().iter().find_map(|layer| {
            let terrain_cell = layer.cells().get(neighbor)?;
            terrain_cell
                .colliders
                .iter()
                .find_map(|collider| collider.contact_with_circle(&terrain_cell.transform, center, radius))
        })
    })
}

/// Resolve at most one terrain contact per bucketed particle.
pub fn resolve_terrain_contacts(
    buckets: &ParticleBuckets,
    layers: &TerrainLayers,
    pools: &mut FluidPools,
    tuning: &CollisionTuning,
    rng: &mut impl Rng,
    stats: &mut CollisionStats,
) {
    for &cell in buckets.occupied() {
        for &handle in buckets.bucket(cell) {
            let Some(particle) = pools.get_mut(handle) else {
                continue;
            };
            let (center, radius) = (particle.position(), particle.radius);
            if let Some(contact) = first_terrain_contact(layers, buckets, cell, center, radius) {
                push_out_and_slide(particle, contact, tuning, rng);
                stats.terrain_contacts += 1;
            }
        }
    }
}

// ============================================================================
// PARTICLE PAIRS
// ============================================================================

fn lateral_jitter(tuning: &CollisionTuning, rng: &mut impl Rng) -> f32 {
    if tuning.jitter_amplitude <= 0.0 {
        return 0.0;
    }
    let magnitude = rng.gen_range(0.2..=1.0) * tuning.jitter_amplitude;
    if rng.gen_bool(0.5) {
        magnitude
    } else {
        -magnitude
    }
}

/// Separate two overlapping particles and damp their closing velocity.
///
/// Returns whether the pair overlapped.
pub fn resolve_particle_pair(
    a: &mut FluidParticle,
    b: &mut FluidParticle,
    tuning: &CollisionTuning,
    rng: &mut impl Rng,
) -> bool {
    let mut delta = a.position() - b.position();
    // Vertically aligned pairs would stack forever; nudge the contact normal sideways.
    if delta.x.abs() < tuning.jitter_threshold {
        delta.x += lateral_jitter(tuning, rng);
    }

    let min_dist = a.radius + b.radius;
    let dist_sq = delta.length_squared();
    if dist_sq >= min_dist * min_dist {
        return false;
    }

    let dist = dist_sq.max(MIN_PAIR_DIST_SQ).sqrt();
    let normal = delta.try_normalize().unwrap_or(Vec2::X);
    let overlap = min_dist - dist;
    let repulsion = if overlap < min_dist * tuning.soft_overlap_fraction {
        tuning.soft_repulsion
    } else {
        tuning.hard_repulsion
    };

    let correction = normal * overlap * repulsion;
    a.transform.position += correction;
    b.transform.position -= correction;

    let closing = (a.velocity - b.velocity).dot(normal);
    if closing < 0.0 {
        let impulse = -tuning.restitution * closing * 0.5;
        a.velocity += normal * impulse;
        b.velocity -= normal * impulse;
    }
    true
}

/// Resolve every particle pair in adjacent buckets exactly once.
pub fn resolve_particle_pairs(
    buckets: &ParticleBuckets,
    pools: &mut FluidPools,
    tuning: &CollisionTuning,
    rng: &mut impl Rng,
    stats: &mut CollisionStats,
) {
    for &cell in buckets.occupied() {
        let own = buckets.bucket(cell);
        for neighbor in buckets.neighborhood(cell) {
            let others = buckets.bucket(neighbor);
            if others.is_empty() {
                continue;
            }
            for &a in own {
                for &b in others {
                    if a >= b {
                        continue;
                    }
                    let Some((pa, pb)) = pools.pair_mut(a, b) else {
                        continue;
                    };
                    stats.pair_checks += 1;
                    if resolve_particle_pair(pa, pb, tuning, rng) {
                        stats.pair_contacts += 1;
                    }
                }
            }
        }
    }
}
