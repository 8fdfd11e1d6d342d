//! Snapshot types.
//!
//! The `Snapshot` struct provides a serializable view of the simulation state
//! for hosts and debugging tools. Nothing reads a snapshot back.

use crate::fluid::{FluidPools, FluidType};
use crate::goal::{GoalDirection, GoalKind, GoalPoint, GoalPoints};
use crate::portal::{PortalId, PortalRegistry};
use crate::systems::collision::CollisionStats;
use crate::terrain::TerrainLayers;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Snapshot of a single particle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleSnapshot {
    pub kind: FluidType,
    pub index: u32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    pub portal_iframe: bool,
}

/// Snapshot of a portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalSnapshot {
    pub id: PortalId,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Rotation in degrees.
    pub rotation: f32,
    pub linked: Option<PortalId>,
}

/// Snapshot of a start or end point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalPointSnapshot {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub kind: GoalKind,
    pub direction: GoalDirection,
    pub releasing: bool,
}

impl From<&GoalPoint> for GoalPointSnapshot {
    fn from(point: &GoalPoint) -> Self {
        Self {
            x: point.position().x,
            y: point.position().y,
            width: point.size.x,
            height: point.size.y,
            kind: point.kind,
            direction: point.direction,
            releasing: point.releasing,
        }
    }
}

/// Complete simulation state snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Number of steps run.
    pub tick: u64,
    /// Elapsed (clamped) simulation time in seconds.
    pub time: f32,
    pub particles: Vec<ParticleSnapshot>,
    pub portals: Vec<PortalSnapshot>,
    pub start_points: Vec<GoalPointSnapshot>,
    pub end_point: Option<GoalPointSnapshot>,
    pub collected: u32,
    pub spawned: u32,
    pub won: bool,
    /// Whether terrain changed since the previous snapshot.
    pub terrain_dirty: bool,
    /// Collision counters of the last frame.
    pub collisions: CollisionStats,
}

impl Snapshot {
    /// Create a snapshot from the ECS world. Missing resources read as empty.
    pub fn from_world(world: &World, tick: u64, time: f32) -> Self {
        let particles = world
            .get_resource::<FluidPools>()
            .map(|pools| {
                pools
                    .iter()
                    .map(|(handle, p)| ParticleSnapshot {
                        kind: handle.kind,
                        index: handle.index,
                        x: p.position().x,
                        y: p.position().y,
                        vx: p.velocity.x,
                        vy: p.velocity.y,
                        radius: p.radius,
                        portal_iframe: p.portal_iframe,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let portals = world
            .get_resource::<PortalRegistry>()
            .map(|registry| {
                registry
                    .iter()
                    .map(|(id, portal)| PortalSnapshot {
                        id,
                        x: portal.transform.position.x,
                        y: portal.transform.position.y,
                        width: portal.transform.scale.x,
                        height: portal.transform.scale.y,
                        rotation: portal.transform.rotation.to_degrees(),
                        linked: portal.linked,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut snapshot = Self {
            tick,
            time,
            particles,
            portals,
            ..Default::default()
        };

        if let Some(goals) = world.get_resource::<GoalPoints>() {
            snapshot.start_points = goals.start_points.iter().map(GoalPointSnapshot::from).collect();
            snapshot.end_point = goals.end_point.as_ref().map(GoalPointSnapshot::from);
            snapshot.collected = goals.collected;
            snapshot.spawned = goals.spawned;
            snapshot.won = goals.won;
        }
        if let Some(layers) = world.get_resource::<TerrainLayers>() {
            snapshot.terrain_dirty = layers.is_dirty();
        }
        if let Some(stats) = world.get_resource::<CollisionStats>() {
            snapshot.collisions = *stats;
        }
        snapshot
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn test_empty_world_snapshot() {
        let world = World::new();
        let snapshot = Snapshot::from_world(&world, 3, 0.5);
        assert_eq!(snapshot.tick, 3);
        assert!(snapshot.particles.is_empty());
        assert!(snapshot.end_point.is_none());
    }

    #[test]
    fn test_snapshot_lists_particles_and_goals() {
        let mut world = World::new();
        let mut pools = FluidPools::default();
        pools.spawn(FluidType::Lava, Vec2::new(1.0, 2.0), 5.0);
        world.insert_resource(pools);
        let mut goals = GoalPoints::default();
        goals.set_end_point(GoalPoint::new(Vec2::ZERO, Vec2::splat(50.0), GoalKind::Flower, GoalDirection::Up));
        goals.collected = 7;
        world.insert_resource(goals);

        let snapshot = Snapshot::from_world(&world, 0, 0.0);
        assert_eq!(snapshot.particles.len(), 1);
        assert_eq!(snapshot.particles[0].kind, FluidType::Lava);
        assert_eq!(snapshot.collected, 7);

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"Lava\""));
        assert!(json.contains("\"Flower\""));
    }
}
