//! Levels driven by the [`crate::state::GameStateManager`].
//!
//! Each level follows the same lifecycle: `load` builds what is shared for
//! the level's lifetime (the marching-squares library), `initialize` builds
//! a fresh [`SimWorld`], `update` and `draw` run once per frame, `free` drops
//! the world and `unload` drops the library.

use crate::api::SimWorld;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::fluid::FluidType;
use crate::goal::{GoalDirection, GoalKind, GoalPoint};
use crate::input::{FrameInput, KeyPresses};
use crate::render_bridge::RenderFrame;
use crate::state::StateId;
use crate::terrain::{GridGeometry, MarchingSquaresLibrary, TerrainGrid, TerrainMaterial};
use glam::Vec2;
use std::sync::Arc;

/// Lifecycle of one level.
pub trait Level {
    fn id(&self) -> StateId;
    fn load(&mut self) -> Result<(), SimError>;
    fn initialize(&mut self) -> Result<(), SimError>;
    /// Advance one frame. Returns a state request, if any.
    fn update(&mut self, dt: f32, input: &FrameInput) -> Option<StateId>;
    fn draw(&self) -> RenderFrame;
    fn free(&mut self);
    fn unload(&mut self);

    /// The running simulation, if initialized.
    fn sim(&self) -> Option<&SimWorld> {
        None
    }
}

/// Requests shared by every level: menu, restart and quit.
fn global_request(keys: &KeyPresses) -> Option<StateId> {
    if keys.quit {
        Some(StateId::Quit)
    } else if keys.menu {
        Some(StateId::MainMenu)
    } else if keys.restart {
        Some(StateId::Restart)
    } else {
        None
    }
}

// ============================================================================
// LAYOUTS
// ============================================================================

/// Node density from the node's world position.
pub type DensityFn = fn(Vec2) -> f32;

const WORLD_ROWS: usize = 45;
const WORLD_COLS: usize = 80;
const WORLD_CELL: f32 = 20.0;

fn solid(filled: bool) -> f32 {
    if filled {
        1.0
    } else {
        0.0
    }
}

fn stone_frame(p: Vec2) -> bool {
    p.x <= -780.0 || p.x >= 780.0 || p.y <= -430.0
}

fn level1_stone(p: Vec2) -> f32 {
    solid(stone_frame(p))
}

fn level1_dirt(p: Vec2) -> f32 {
    solid(!stone_frame(p) && p.y > -350.0 && p.y < 300.0)
}

fn level2_stone(p: Vec2) -> f32 {
    solid(stone_frame(p) || p.x.abs() <= 20.0)
}

fn level2_dirt(p: Vec2) -> f32 {
    solid(level1_dirt(p) > 0.0 && level2_stone(p) == 0.0)
}

fn menu_basin(p: Vec2) -> f32 {
    solid(p.x <= -760.0 || p.x >= 760.0 || p.y <= -400.0)
}

/// Authored composition of a level.
#[derive(Debug, Clone)]
pub struct LevelLayout {
    pub id: StateId,
    pub rows: usize,
    pub cols: usize,
    pub cell_size: f32,
    pub center: Vec2,
    pub layers: Vec<(TerrainMaterial, DensityFn)>,
    pub start_points: Vec<GoalPoint>,
    pub end_point: Option<GoalPoint>,
    /// Whether the player may place portals.
    pub portals: bool,
}

impl LevelLayout {
    fn play(id: StateId, layers: Vec<(TerrainMaterial, DensityFn)>, portals: bool) -> Self {
        Self {
            id,
            rows: WORLD_ROWS,
            cols: WORLD_COLS,
            cell_size: WORLD_CELL,
            center: Vec2::ZERO,
            layers,
            start_points: vec![GoalPoint::new(
                Vec2::new(-650.0, 400.0),
                Vec2::splat(50.0),
                GoalKind::Pipe,
                GoalDirection::Down,
            )],
            end_point: Some(GoalPoint::new(
                Vec2::new(650.0, -400.0),
                Vec2::splat(50.0),
                GoalKind::Flower,
                GoalDirection::Up,
            )),
            portals,
        }
    }

    /// Dig through a dirt band to lead water from the pipe to the flower.
    pub fn level1() -> Self {
        Self::play(
            StateId::Level1,
            vec![(TerrainMaterial::Dirt, level1_dirt), (TerrainMaterial::Stone, level1_stone)],
            false,
        )
    }

    /// Level 1 split by a stone wall; portals carry water across.
    pub fn level2() -> Self {
        Self::play(
            StateId::Level2,
            vec![(TerrainMaterial::Dirt, level2_dirt), (TerrainMaterial::Stone, level2_stone)],
            true,
        )
    }

    /// Stone basin for the main menu sandbox.
    pub fn main_menu() -> Self {
        Self {
            id: StateId::MainMenu,
            rows: WORLD_ROWS,
            cols: WORLD_COLS,
            cell_size: WORLD_CELL,
            center: Vec2::ZERO,
            layers: vec![(TerrainMaterial::Stone, menu_basin)],
            start_points: Vec::new(),
            end_point: None,
            portals: false,
        }
    }

    pub fn geometry(&self) -> Result<GridGeometry, SimError> {
        GridGeometry::centered(self.center, self.rows, self.cols, self.cell_size)
    }

    /// Build a world with this layout's terrain and goal points.
    pub fn build(&self, mut config: SimConfig, library: &Arc<MarchingSquaresLibrary>) -> Result<SimWorld, SimError> {
        config.portal.player_placement = self.portals;
        let threshold = config.terrain.threshold;
        let mut sim = SimWorld::new(config)?;

        let geometry = self.geometry()?;
        for &(material, density) in &self.layers {
            let grid = TerrainGrid::build(material, geometry, threshold, library.clone(), |row, col| {
                density(geometry.node_position(row, col))
            })?;
            sim.add_terrain(grid)?;
        }
        for point in &self.start_points {
            sim.add_start_point(*point);
        }
        if let Some(end) = self.end_point {
            sim.set_end_point(end);
        }
        Ok(sim)
    }
}

// ============================================================================
// PLAY LEVELS
// ============================================================================

/// An authored puzzle level (Level1, Level2).
pub struct PlayLevel {
    layout: LevelLayout,
    config: SimConfig,
    library: Option<Arc<MarchingSquaresLibrary>>,
    sim: Option<SimWorld>,
    debug: bool,
}

impl PlayLevel {
    pub fn new(layout: LevelLayout, config: SimConfig) -> Self {
        Self {
            layout,
            config,
            library: None,
            sim: None,
            debug: false,
        }
    }

    pub fn debug(&self) -> bool {
        self.debug
    }
}

impl Level for PlayLevel {
    fn id(&self) -> StateId {
        self.layout.id
    }

    fn load(&mut self) -> Result<(), SimError> {
        self.library = Some(MarchingSquaresLibrary::build());
        Ok(())
    }

    fn initialize(&mut self) -> Result<(), SimError> {
        let library = self
            .library
            .as_ref()
            .ok_or(SimError::InvalidConfig("level initialized before load"))?;
        self.sim = Some(self.layout.build(self.config.clone(), library)?);
        Ok(())
    }

    fn update(&mut self, dt: f32, input: &FrameInput) -> Option<StateId> {
        if input.keys.debug {
            self.debug = !self.debug;
        }
        let sim = self.sim.as_mut()?;
        sim.step(dt, input);

        if let Some(request) = global_request(&input.keys) {
            return Some(request);
        }
        (input.keys.confirm && sim.has_won()).then_some(StateId::Next)
    }

    fn draw(&self) -> RenderFrame {
        self.sim
            .as_ref()
            .map(|sim| sim.render_frame(self.debug))
            .unwrap_or_default()
    }

    fn free(&mut self) {
        self.sim = None;
        self.debug = false;
    }

    fn unload(&mut self) {
        self.library = None;
    }

    fn sim(&self) -> Option<&SimWorld> {
        self.sim.as_ref()
    }
}

// ============================================================================
// MAIN MENU
// ============================================================================

/// Seconds between cursor spawns while the primary button is held.
pub const MENU_SPAWN_INTERVAL: f32 = 0.05;

/// Fluid sandbox: hold the primary button to pour water at the cursor.
pub struct MainMenu {
    layout: LevelLayout,
    config: SimConfig,
    library: Option<Arc<MarchingSquaresLibrary>>,
    sim: Option<SimWorld>,
    spawn_timer: f32,
}

impl MainMenu {
    pub fn new(config: SimConfig) -> Self {
        Self {
            layout: LevelLayout::main_menu(),
            config,
            library: None,
            sim: None,
            spawn_timer: 0.0,
        }
    }
}

impl Level for MainMenu {
    fn id(&self) -> StateId {
        StateId::MainMenu
    }

    fn load(&mut self) -> Result<(), SimError> {
        self.library = Some(MarchingSquaresLibrary::build());
        Ok(())
    }

    fn initialize(&mut self) -> Result<(), SimError> {
        let library = self
            .library
            .as_ref()
            .ok_or(SimError::InvalidConfig("level initialized before load"))?;
        self.sim = Some(self.layout.build(self.config.clone(), library)?);
        self.spawn_timer = 0.0;
        Ok(())
    }

    fn update(&mut self, dt: f32, input: &FrameInput) -> Option<StateId> {
        let sim = self.sim.as_mut()?;
        if input.primary.held {
            self.spawn_timer -= sim.config().clamp_dt(dt);
            if self.spawn_timer <= 0.0 {
                self.spawn_timer = MENU_SPAWN_INTERVAL;
                let radius = sim.config().goal.spawn_radius;
                sim.spawn_particle(FluidType::Water, input.cursor, radius);
            }
        }
        sim.step(dt, input);

        if input.keys.start {
            return Some(StateId::Level1);
        }
        global_request(&input.keys)
    }

    fn draw(&self) -> RenderFrame {
        self.sim
            .as_ref()
            .map(|sim| sim.render_frame(false))
            .unwrap_or_default()
    }

    fn free(&mut self) {
        self.sim = None;
    }

    fn unload(&mut self) {
        self.library = None;
    }

    fn sim(&self) -> Option<&SimWorld> {
        self.sim.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ButtonState;
    use crate::render_bridge::DrawKind;

    fn config() -> SimConfig {
        SimConfig::default().with_seed(4)
    }

    fn ready(mut level: impl Level) -> impl Level {
        level.load().unwrap();
        level.initialize().unwrap();
        level
    }

    #[test]
    fn test_initialize_requires_load() {
        let mut level = PlayLevel::new(LevelLayout::level1(), config());
        assert!(matches!(level.initialize(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_level1_layout() {
        let level = ready(PlayLevel::new(LevelLayout::level1(), config()));
        let sim = level.sim().unwrap();
        assert!(!sim.config().portal.player_placement);

        let terrain = sim.terrain_snapshot();
        assert_eq!(terrain.layers.len(), 2);
        assert_eq!(terrain.layers[0].material, TerrainMaterial::Dirt);
        assert_eq!(terrain.layers[0].cases.len(), 45 * 80);

        let frame = level.draw();
        assert_eq!(frame.count_of(DrawKind::StartPoint), 1);
        assert_eq!(frame.count_of(DrawKind::EndPoint), 1);
        assert!(frame.count_of(DrawKind::Terrain) > 0);
    }

    #[test]
    fn test_level2_enables_portals_and_wall() {
        let layout = LevelLayout::level2();
        assert_eq!(level2_stone(Vec2::new(0.0, 200.0)), 1.0);
        assert_eq!(level2_dirt(Vec2::new(0.0, 200.0)), 0.0);
        assert_eq!(level2_dirt(Vec2::new(-200.0, 0.0)), 1.0);

        let level = ready(PlayLevel::new(layout, config()));
        assert!(level.sim().unwrap().config().portal.player_placement);
    }

    #[test]
    fn test_start_and_end_clear_of_terrain() {
        for layout in [LevelLayout::level1(), LevelLayout::level2()] {
            for &(_, density) in &layout.layers {
                assert_eq!(density(Vec2::new(-650.0, 400.0)), 0.0);
                assert_eq!(density(Vec2::new(650.0, -400.0)), 0.0);
            }
        }
    }

    #[test]
    fn test_debug_toggle_and_restart_request() {
        let mut level = ready(PlayLevel::new(LevelLayout::level1(), config()));
        let debug = FrameInput::default().with_keys(KeyPresses {
            debug: true,
            ..Default::default()
        });
        assert_eq!(level.update(1.0 / 60.0, &debug), None);
        assert!(level.draw().count_of(DrawKind::Collider) > 0);

        let restart = FrameInput::default().with_keys(KeyPresses {
            restart: true,
            ..Default::default()
        });
        assert_eq!(level.update(1.0 / 60.0, &restart), Some(StateId::Restart));
    }

    #[test]
    fn test_confirm_needs_win() {
        let mut level = ready(PlayLevel::new(LevelLayout::level1(), config()));
        let confirm = FrameInput::default().with_keys(KeyPresses {
            confirm: true,
            ..Default::default()
        });
        assert_eq!(level.update(1.0 / 60.0, &confirm), None);
    }

    #[test]
    fn test_free_drops_world() {
        let mut level = ready(PlayLevel::new(LevelLayout::level1(), config()));
        level.free();
        assert!(level.sim().is_none());
        assert!(level.draw().is_empty());
        assert_eq!(level.update(1.0 / 60.0, &FrameInput::default()), None);
        level.initialize().unwrap();
        assert!(level.sim().is_some());
    }

    #[test]
    fn test_menu_pours_water_while_held() {
        let mut menu = ready(MainMenu::new(config()));
        let held = FrameInput::at(Vec2::new(0.0, 100.0)).with_primary(ButtonState::down());
        for _ in 0..12 {
            assert_eq!(menu.update(1.0 / 60.0, &held), None);
        }
        let count = menu.sim().unwrap().particle_count();
        assert!((3..=5).contains(&count), "spawned {}", count);

        for _ in 0..12 {
            menu.update(1.0 / 60.0, &FrameInput::default());
        }
        assert_eq!(menu.sim().unwrap().particle_count(), count);
    }

    #[test]
    fn test_menu_start_key() {
        let mut menu = ready(MainMenu::new(config()));
        let start = FrameInput::default().with_keys(KeyPresses {
            start: true,
            ..Default::default()
        });
        assert_eq!(menu.update(1.0 / 60.0, &start), Some(StateId::Level1));
    }
}
