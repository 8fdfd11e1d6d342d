//! Public API for the simulation.
//!
//! [`SimWorld`] is the interface a host (or the level driver in
//! [`crate::level`]) uses to build a level, step it once per rendered frame
//! and read state back.
//!
//! ## Frame Step
//!
//! `step(dt, input)` runs two chained schedules:
//!
//! 1. **Input**: terrain edits, start-point toggles, portal placement. Edits
//!    rebuild terrain geometry immediately.
//! 2. **Frame**: spawning, the substepped fluid step, end-point collection,
//!    portal teleports, the win check.
//!
//! There is no fixed-timestep accumulator. The frame delta is clamped to
//! `max_frame_dt` and split into `substeps` equal substeps.

use crate::components::Rgba;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::fluid::{FluidPools, FluidType, ParticleHandle};
use crate::goal::{GoalPoint, GoalPoints};
use crate::input::FrameInput;
use crate::portal::{Portal, PortalId, PortalRegistry};
use crate::profiler::Profiler;
use crate::render_bridge::RenderFrame;
use crate::systems::*;
use crate::terrain::{GridGeometry, MarchingSquaresLibrary, TerrainGrid, TerrainLayers, TerrainMaterial, TerrainSnapshot};
use crate::world::Snapshot;
use bevy_ecs::prelude::*;
use glam::Vec2;
use rand::Rng;
use std::sync::Arc;

/// The main simulation world container.
///
/// Holds the ECS world and both schedules, providing a clean API for:
/// - Building terrain, goal points and portals
/// - Stepping the simulation forward
/// - Extracting snapshots and render frames
pub struct SimWorld {
    world: World,
    input_schedule: Schedule,
    frame_schedule: Schedule,
    tick: u64,
    time: f32,
    profiler: Option<Profiler>,
}

impl SimWorld {
    /// Create an empty simulation world. Fails if the config is invalid.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;

        let mut world = World::new();
        world.insert_resource(DeltaTime(0.0));
        world.insert_resource(SimRng::new(config.rng_seed));
        world.insert_resource(FluidPools::new(&config.fluid));
        world.insert_resource(TerrainLayers::default());
        world.insert_resource(PortalRegistry::new());
        world.insert_resource(GoalPoints::default());
        world.insert_resource(FrameInput::default());
        world.insert_resource(CollisionStats::default());
        world.insert_resource(config);

        let mut input_schedule = Schedule::default();
        input_schedule.add_systems((terrain_edit_system, start_point_toggle_system, portal_input_system).chain());

        let mut frame_schedule = Schedule::default();
        frame_schedule.add_systems(
            (
                start_point_spawn_system,
                fluid_step_system,
                end_point_collect_system,
                portal_teleport_system,
                win_condition_system,
            )
                .chain(),
        );

        Ok(Self {
            world,
            input_schedule,
            frame_schedule,
            tick: 0,
            time: 0.0,
            profiler: None,
        })
    }

    // ------------------------------------------------------------------------
    // Level construction
    // ------------------------------------------------------------------------

    /// Add a terrain layer. Layers must share the first layer's geometry.
    pub fn add_terrain(&mut self, grid: TerrainGrid) -> Result<usize, SimError> {
        let index = self.world.resource_mut::<TerrainLayers>().add(grid)?;
        log::debug!("terrain layer {} added", index);
        Ok(index)
    }

    /// Add a layer with every node randomly solid or empty.
    pub fn add_random_terrain(
        &mut self,
        material: TerrainMaterial,
        geometry: GridGeometry,
        library: Arc<MarchingSquaresLibrary>,
    ) -> Result<usize, SimError> {
        let threshold = self.config().terrain.threshold;
        let grid = {
            let mut rng = self.world.resource_mut::<SimRng>();
            TerrainGrid::random(material, geometry, threshold, library, &mut rng.0)?
        };
        self.add_terrain(grid)
    }

    pub fn spawn_particle(&mut self, kind: FluidType, position: Vec2, spawn_radius: f32) -> ParticleHandle {
        self.world.resource_mut::<FluidPools>().spawn(kind, position, spawn_radius)
    }

    pub fn set_fluid_gravity(&mut self, kind: FluidType, gravity: f32) {
        self.world.resource_mut::<FluidPools>().set_type_gravity(kind, gravity);
    }

    pub fn add_start_point(&mut self, point: GoalPoint) {
        self.world.resource_mut::<GoalPoints>().add_start_point(point);
    }

    pub fn set_end_point(&mut self, point: GoalPoint) {
        self.world.resource_mut::<GoalPoints>().set_end_point(point);
    }

    /// Place a portal. Every second call links to the previous one.
    pub fn setup_portal(&mut self, position: Vec2, scale: Vec2, rotation_deg: f32) -> PortalId {
        let color = {
            let mut rng = self.world.resource_mut::<SimRng>();
            Rgba::rgb(rng.0.gen(), rng.0.gen(), rng.0.gen())
        };
        let fraction = self.config().portal.collider_fraction;
        let portal = Portal::new(position, scale, rotation_deg, color, fraction);
        self.world.resource_mut::<PortalRegistry>().setup(portal)
    }

    /// Remove a portal, unlinking its partner.
    pub fn remove_portal(&mut self, id: PortalId) -> bool {
        self.world.resource_mut::<PortalRegistry>().remove(id).is_some()
    }

    /// Drop every level object. Config, RNG and counters survive.
    pub fn clear_level(&mut self) {
        let fluid = self.config().fluid.clone();
        self.world.insert_resource(FluidPools::new(&fluid));
        self.world.insert_resource(TerrainLayers::default());
        self.world.insert_resource(GoalPoints::default());
        self.world.resource_mut::<PortalRegistry>().clear();
        self.world.resource_mut::<CollisionStats>().reset();
    }

    // ------------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------------

    /// Step the simulation forward by one rendered frame.
    pub fn step(&mut self, dt: f32, input: &FrameInput) {
        self.world.resource_mut::<DeltaTime>().0 = dt;
        *self.world.resource_mut::<FrameInput>() = *input;

        match self.profiler.as_mut() {
            Some(profiler) => {
                profiler.time_section("input", || self.input_schedule.run(&mut self.world));
                profiler.time_section("frame", || self.frame_schedule.run(&mut self.world));
                profiler.tick();
            }
            None => {
                self.input_schedule.run(&mut self.world);
                self.frame_schedule.run(&mut self.world);
            }
        }

        self.tick += 1;
        self.time += self.config().clamp_dt(dt);
    }

    // ------------------------------------------------------------------------
    // Read back
    // ------------------------------------------------------------------------

    /// Snapshot of the current state. Clears the terrain-modified flag.
    pub fn snapshot(&mut self) -> Snapshot {
        let snapshot = Snapshot::from_world(&self.world, self.tick, self.time);
        self.world.resource_mut::<TerrainLayers>().take_dirty();
        snapshot
    }

    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// Per-layer case indices (for initial load or after a terrain change).
    pub fn terrain_snapshot(&self) -> TerrainSnapshot {
        TerrainSnapshot::from_layers(self.world.resource::<TerrainLayers>())
    }

    pub fn terrain_snapshot_json(&self) -> String {
        serde_json::to_string(&self.terrain_snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Draw items for the renderer. `debug` adds the collider overlay.
    pub fn render_frame(&self, debug: bool) -> RenderFrame {
        RenderFrame::from_world(&self.world, debug)
    }

    pub fn collected(&self) -> u32 {
        self.world.resource::<GoalPoints>().collected
    }

    pub fn has_won(&self) -> bool {
        self.world.resource::<GoalPoints>().won
    }

    pub fn particle_count(&self) -> usize {
        self.world.resource::<FluidPools>().total_count()
    }

    pub fn collision_stats(&self) -> CollisionStats {
        *self.world.resource::<CollisionStats>()
    }

    pub fn config(&self) -> &SimConfig {
        self.world.resource::<SimConfig>()
    }

    /// Mutable config, for per-level overrides.
    pub fn config_mut(&mut self) -> Mut<'_, SimConfig> {
        self.world.resource_mut::<SimConfig>()
    }

    /// Time the input and frame schedules from now on.
    pub fn enable_profiling(&mut self) {
        if self.profiler.is_none() {
            self.profiler = Some(Profiler::new());
        }
    }

    pub fn profiler(&self) -> Option<&Profiler> {
        self.profiler.as_ref()
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Elapsed simulation time (sum of clamped frame deltas).
    pub fn current_time(&self) -> f32 {
        self.time
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::{GoalDirection, GoalKind};
    use crate::input::ButtonState;

    fn quiet() -> SimConfig {
        let mut config = SimConfig::default().with_seed(9);
        config.fluid.integration_jitter = 0.0;
        config
    }

    fn basin(sim: &mut SimWorld) {
        let geometry = GridGeometry::centered(Vec2::ZERO, 10, 10, 20.0).unwrap();
        let grid = TerrainGrid::build(TerrainMaterial::Stone, geometry, 1.0, MarchingSquaresLibrary::build(), |row, col| {
            if row <= 2 || col <= 1 || col >= 9 {
                1.0
            } else {
                0.0
            }
        })
        .unwrap();
        sim.add_terrain(grid).unwrap();
    }

    #[test]
    fn test_new_world() {
        let sim = SimWorld::new(SimConfig::default()).unwrap();
        assert_eq!(sim.current_tick(), 0);
        assert_eq!(sim.particle_count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimConfig {
            substeps: 0,
            ..Default::default()
        };
        assert!(matches!(SimWorld::new(config), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_step_advances_tick_and_clamped_time() {
        let mut sim = SimWorld::new(quiet()).unwrap();
        sim.step(0.5, &FrameInput::default());
        sim.step(1.0 / 120.0, &FrameInput::default());
        assert_eq!(sim.current_tick(), 2);
        assert!((sim.current_time() - (1.0 / 60.0 + 1.0 / 120.0)).abs() < 1e-6);
    }

    #[test]
    fn test_particle_lands_on_floor() {
        let mut sim = SimWorld::new(quiet()).unwrap();
        basin(&mut sim);
        sim.spawn_particle(FluidType::Water, Vec2::new(5.0, 40.0), 5.0);

        for _ in 0..180 {
            sim.step(1.0 / 60.0, &FrameInput::default());
        }
        let snapshot = sim.snapshot();
        let p = &snapshot.particles[0];
        assert!(p.y > -50.0, "particle sank into the floor: {}", p.y);
        assert!(p.y < -40.0);
    }

    #[test]
    fn test_release_collect_and_win() {
        let mut config = quiet();
        config.goal.particle_max_count = 6;
        let mut sim = SimWorld::new(config).unwrap();
        sim.add_start_point(GoalPoint::new(
            Vec2::new(0.0, 100.0),
            Vec2::splat(50.0),
            GoalKind::Pipe,
            GoalDirection::Down,
        ));
        sim.set_end_point(GoalPoint::new(
            Vec2::new(0.0, -100.0),
            Vec2::splat(50.0),
            GoalKind::Flower,
            GoalDirection::Up,
        ));

        let click = FrameInput::at(Vec2::new(0.0, 100.0));
        sim.step(1.0 / 60.0, &click.with_primary(ButtonState::just_pressed()));
        sim.step(1.0 / 60.0, &click.with_primary(ButtonState::just_released()));
        for _ in 0..120 {
            sim.step(1.0 / 60.0, &FrameInput::default());
        }

        let snapshot = sim.snapshot();
        assert_eq!(snapshot.spawned, 6);
        assert_eq!(sim.collected(), 6);
        assert!(sim.has_won());
        assert_eq!(sim.particle_count(), 0);
    }

    #[test]
    fn test_terrain_dirty_cleared_by_snapshot() {
        let mut sim = SimWorld::new(quiet()).unwrap();
        let geometry = GridGeometry::centered(Vec2::ZERO, 4, 4, 20.0).unwrap();
        sim.add_terrain(
            TerrainGrid::build(TerrainMaterial::Dirt, geometry, 1.0, MarchingSquaresLibrary::build(), |_, _| 1.0)
                .unwrap(),
        )
        .unwrap();
        assert!(sim.snapshot().terrain_dirty);
        assert!(!sim.snapshot().terrain_dirty);

        sim.step(1.0 / 60.0, &FrameInput::at(Vec2::ZERO).with_primary(ButtonState::down()));
        assert!(sim.snapshot().terrain_dirty);
        let cases = &sim.terrain_snapshot().layers[0].cases;
        assert!(cases.iter().any(|&c| c != 15));
    }

    #[test]
    fn test_portals_link_and_remove() {
        let mut sim = SimWorld::new(quiet()).unwrap();
        let a = sim.setup_portal(Vec2::new(-100.0, 0.0), Vec2::new(30.0, 60.0), 0.0);
        let b = sim.setup_portal(Vec2::new(100.0, 0.0), Vec2::new(30.0, 60.0), 90.0);
        let snapshot = sim.snapshot();
        assert_eq!(snapshot.portals.len(), 2);
        assert_eq!(snapshot.portals[0].linked, Some(b));

        assert!(sim.remove_portal(b));
        assert!(!sim.remove_portal(b));
        let registry = sim.world().resource::<PortalRegistry>();
        assert_eq!(registry.get(a).unwrap().linked, None);
    }

    #[test]
    fn test_clear_level_keeps_counters() {
        let mut sim = SimWorld::new(quiet()).unwrap();
        basin(&mut sim);
        sim.spawn_particle(FluidType::Water, Vec2::ZERO, 5.0);
        sim.step(1.0 / 60.0, &FrameInput::default());
        sim.clear_level();
        assert_eq!(sim.particle_count(), 0);
        assert!(sim.render_frame(false).is_empty());
        assert_eq!(sim.current_tick(), 1);
    }

    #[test]
    fn test_profiling_times_both_schedules() {
        let mut sim = SimWorld::new(quiet()).unwrap();
        assert!(sim.profiler().is_none());
        sim.enable_profiling();
        for _ in 0..3 {
            sim.step(1.0 / 60.0, &FrameInput::default());
        }
        let profiler = sim.profiler().unwrap();
        assert_eq!(profiler.frame_count(), 3);
        assert_eq!(profiler.get_section("input").unwrap().call_count, 3);
        assert_eq!(profiler.get_section("frame").unwrap().call_count, 3);
    }

    #[test]
    fn test_snapshot_json() {
        let mut sim = SimWorld::new(quiet()).unwrap();
        sim.spawn_particle(FluidType::Water, Vec2::ZERO, 5.0);
        let json = sim.snapshot_json();
        assert!(json.contains("particles"));
        assert!(json.contains("Water"));
        assert!(sim.terrain_snapshot_json().contains("layers"));
    }
}
