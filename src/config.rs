//! Simulation configuration.
//!
//! Every tuning constant of the fluid, collision, portal and goal logic lives
//! here with a named default. The whole tree is serde-loadable, so a host can
//! override a handful of fields from JSON and keep the rest.

use crate::error::SimError;
use bevy_ecs::prelude::*;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Top-level simulation configuration resource.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Upper bound on a frame's delta time (seconds).
    pub max_frame_dt: f32,
    /// Collision/integration substeps per frame.
    pub substeps: u32,
    /// Seed for the simulation RNG. `None` seeds from entropy.
    pub rng_seed: Option<u64>,
    pub fluid: FluidParams,
    pub collision: CollisionTuning,
    pub portal: PortalParams,
    pub goal: GoalParams,
    pub terrain: TerrainParams,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_frame_dt: 1.0 / 60.0,
            substeps: 4,
            rng_seed: None,
            fluid: FluidParams::default(),
            collision: CollisionTuning::default(),
            portal: PortalParams::default(),
            goal: GoalParams::default(),
            terrain: TerrainParams::default(),
        }
    }
}

impl SimConfig {
    /// Parse a (possibly partial) JSON config and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, SimError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Builder: fix the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Builder: replace the collision tuning block.
    pub fn with_collision(mut self, collision: CollisionTuning) -> Self {
        self.collision = collision;
        self
    }

    /// Sub-step length for a frame of `dt` seconds after clamping.
    pub fn substep_dt(&self, dt: f32) -> f32 {
        self.clamp_dt(dt) / self.substeps.max(1) as f32
    }

    /// Clamp a raw frame delta into `[0, max_frame_dt]`.
    pub fn clamp_dt(&self, dt: f32) -> f32 {
        if dt.is_finite() {
            dt.clamp(0.0, self.max_frame_dt)
        } else {
            0.0
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.max_frame_dt > 0.0) {
            return Err(SimError::InvalidConfig("max_frame_dt must be positive"));
        }
        if self.substeps == 0 {
            return Err(SimError::InvalidConfig("substeps must be at least 1"));
        }
        if !(self.fluid.collider_shrink > 0.0) {
            return Err(SimError::InvalidConfig("collider_shrink must be positive"));
        }
        if self.fluid.stop_speed_sq < 0.0 {
            return Err(SimError::InvalidConfig("stop_speed_sq must not be negative"));
        }
        self.collision.validate()?;
        if self.goal.win_ratio.1 == 0 {
            return Err(SimError::InvalidConfig("win_ratio denominator must be non-zero"));
        }
        if !(self.goal.spawn_interval > 0.0) {
            return Err(SimError::InvalidConfig("spawn_interval must be positive"));
        }
        if !(self.goal.spawn_radius > 0.0) {
            return Err(SimError::InvalidConfig("spawn_radius must be positive"));
        }
        if self.terrain.edit_radius < 0.0 {
            return Err(SimError::InvalidConfig("edit_radius must not be negative"));
        }
        Ok(())
    }
}

/// Particle integration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidParams {
    /// Vertical acceleration applied to every fluid type unless overridden.
    pub gravity: f32,
    /// Velocities with squared magnitude below this are zeroed after integration.
    pub stop_speed_sq: f32,
    /// Amplitude of the per-substep random velocity kick (0 disables it).
    pub integration_jitter: f32,
    /// Collider radius as a fraction of the spawn radius.
    pub collider_shrink: f32,
    /// Seconds a particle ignores portals after a teleport.
    pub iframe_duration: f32,
    /// Capacity reserved per pool at startup.
    pub pool_capacity: usize,
}

impl Default for FluidParams {
    fn default() -> Self {
        Self {
            gravity: -1000.0,
            stop_speed_sq: 1.99,
            integration_jitter: 3.0,
            collider_shrink: 0.7,
            iframe_duration: 0.5,
            pool_capacity: 1000,
        }
    }
}

/// Contact response tuning for terrain and particle pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionTuning {
    /// Extra distance added to every terrain push-out.
    pub push_slop: f32,
    /// Cap on a single terrain push-out, as a fraction of the particle radius.
    pub max_push_fraction: f32,
    /// Tangential damping after a terrain contact is drawn from this range.
    pub damping_min: f32,
    pub damping_max: f32,
    /// Pairs whose x separation is below this get a lateral perturbation.
    pub jitter_threshold: f32,
    pub jitter_amplitude: f32,
    /// Overlaps below this fraction of the contact distance use the soft repulsion.
    pub soft_overlap_fraction: f32,
    pub soft_repulsion: f32,
    pub hard_repulsion: f32,
    /// Normal impulse scale for closing pairs, split equally between both particles.
    pub restitution: f32,
}

impl Default for CollisionTuning {
    fn default() -> Self {
        Self {
            push_slop: 0.10,
            max_push_fraction: 0.5,
            damping_min: 0.95,
            damping_max: 0.98,
            jitter_threshold: 0.001,
            jitter_amplitude: 0.05,
            soft_overlap_fraction: 0.1,
            soft_repulsion: 0.2,
            hard_repulsion: 0.5,
            restitution: 1.08,
        }
    }
}

impl CollisionTuning {
    /// Smaller slop and push cap. Stacks rest lower but settle slower.
    pub fn tight() -> Self {
        Self {
            push_slop: 0.01,
            max_push_fraction: 0.25,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), SimError> {
        if !(self.max_push_fraction > 0.0) {
            return Err(SimError::InvalidConfig("max_push_fraction must be positive"));
        }
        if self.push_slop < 0.0 {
            return Err(SimError::InvalidConfig("push_slop must not be negative"));
        }
        if self.damping_min > self.damping_max || self.damping_min < 0.0 {
            return Err(SimError::InvalidConfig("damping range must be ordered and non-negative"));
        }
        if self.restitution < 0.0 {
            return Err(SimError::InvalidConfig("restitution must not be negative"));
        }
        Ok(())
    }
}

/// Portal behaviour and placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalParams {
    /// Speed added along the exit facing on teleport.
    pub exit_boost: f32,
    /// Size of portals placed by the player.
    pub placement_scale: Vec2,
    /// Collider box size as a fraction of the portal scale.
    pub collider_fraction: f32,
    /// Placement rotation increment (degrees).
    pub rotation_step_deg: f32,
    /// Whether the player may place and remove portals.
    pub player_placement: bool,
}

impl Default for PortalParams {
    fn default() -> Self {
        Self {
            exit_boost: 50.0,
            placement_scale: Vec2::new(30.0, 60.0),
            collider_fraction: 0.9,
            rotation_step_deg: 45.0,
            player_placement: true,
        }
    }
}

/// Start/end point parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalParams {
    /// Seconds between spawns from a releasing start point.
    pub spawn_interval: f32,
    /// Spawn radius of released particles.
    pub spawn_radius: f32,
    /// Total particles a level may release.
    pub particle_max_count: u32,
    /// `collected / particle_max_count >= num / den` wins.
    pub win_ratio: (u32, u32),
}

impl Default for GoalParams {
    fn default() -> Self {
        Self {
            spawn_interval: 0.025,
            spawn_radius: 5.0,
            particle_max_count: 300,
            win_ratio: (1, 3),
        }
    }
}

/// Terrain density and editing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    /// Node densities at or above this are solid.
    pub threshold: f32,
    /// Radius of player terrain edits (0 snaps to the nearest node).
    pub edit_radius: f32,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            edit_radius: 20.0,
        }
    }
}
