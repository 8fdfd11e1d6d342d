//! Terrafluid - Simulation Core
//!
//! A 2D sandbox core: marching-squares destructible terrain, a substepped
//! particle fluid, paired portals and start/end goal points. Uses `bevy_ecs`
//! resources and schedules; a host drives it once per rendered frame.

pub mod api;
pub mod collider;
pub mod components;
pub mod config;
pub mod error;
pub mod fluid;
pub mod goal;
pub mod input;
pub mod level;
pub mod portal;
pub mod profiler;
pub mod render_bridge;
pub mod spatial;
pub mod state;
pub mod systems;
pub mod terrain;
pub mod world;

pub use api::SimWorld;
pub use components::{Rgba, Transform};
pub use config::SimConfig;
pub use error::SimError;
pub use fluid::{FluidParticle, FluidPools, FluidType, ParticleHandle};
pub use goal::{GoalDirection, GoalKind, GoalPoint, GoalPoints};
pub use input::{ButtonState, FrameInput, KeyPresses};
pub use level::{Level, LevelLayout, MainMenu, PlayLevel};
pub use portal::{Portal, PortalId, PortalRegistry};
pub use render_bridge::{frame_to_flatbuffer, DrawItem, DrawKind, MeshHandle, RenderFrame};
pub use state::{GameStateManager, StateId};
pub use systems::*;
pub use terrain::{GridGeometry, MarchingSquaresLibrary, TerrainGrid, TerrainLayers, TerrainMaterial, TerrainSnapshot};
pub use world::Snapshot;
