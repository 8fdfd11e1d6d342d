//! Render output for the host's renderer.
//!
//! The core never builds vertex data beyond the static marching-squares
//! library. Each frame it hands the renderer a list of [`DrawItem`]s: what is
//! drawn, which shared mesh to use, the world matrix and a colour.
//!
//! # Buffer Layout (Version 1.0)
//!
//! [`frame_to_flatbuffer`] packs a [`RenderFrame`] into a `Vec<f32>`:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ HEADER (1 element)                                              │
//! │ [0] item_count (as f32)                                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ For each item i (offset = 1 + i * DRAW_STRIDE):                 │
//! │   [+0]       kind    - DrawKind id (see DRAW_KIND_* constants)  │
//! │   [+1]       mesh    - MeshHandle id                            │
//! │   [+2..+11]  matrix  - world Mat3, column-major (9 floats)      │
//! │   [+11..+15] color   - r, g, b, a                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Mesh Handle Mapping
//!
//! | Mesh                      | ID      |
//! |---------------------------|---------|
//! | Terrain case `c`          | `c`     |
//! | Collider overlay case `c` | `16+c`  |
//! | Circle                    | 32      |
//! | Rect                      | 33      |
//!
//! Items are emitted in draw order: terrain layers, collider overlay,
//! particles, portals, start points, end point.

use crate::components::{Rgba, Transform};
use crate::fluid::FluidPools;
use crate::goal::{GoalPoints, END_POINT_COLOR, START_POINT_COLOR};
use crate::portal::PortalRegistry;
use crate::terrain::TerrainLayers;
use bevy_ecs::prelude::*;
use glam::Mat3;

// ============================================================================
// CONSTANTS - STABLE BUFFER CONTRACT
// ============================================================================

/// Number of f32 values per draw item.
///
/// **Part of the stable buffer contract. Do not change without versioning.**
pub const DRAW_STRIDE: usize = 15;

/// Number of f32 values in the buffer header (item count).
pub const HEADER_SIZE: usize = 1;

pub const FIELD_KIND: usize = 0;
pub const FIELD_MESH: usize = 1;
pub const FIELD_MATRIX: usize = 2;
pub const FIELD_COLOR: usize = 11;

pub const DRAW_KIND_TERRAIN: f32 = 0.0;
pub const DRAW_KIND_COLLIDER: f32 = 1.0;
pub const DRAW_KIND_PARTICLE: f32 = 2.0;
pub const DRAW_KIND_PORTAL: f32 = 3.0;
pub const DRAW_KIND_START_POINT: f32 = 4.0;
pub const DRAW_KIND_END_POINT: f32 = 5.0;

const OVERLAY_COLOR: Rgba = Rgba::new(0.0, 1.0, 0.0, 0.5);

// ============================================================================
// DRAW ITEMS
// ============================================================================

/// Shared mesh selected for a draw item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshHandle {
    /// Marching-squares mesh of a case (0..16).
    TerrainCase(u8),
    /// Collider outline of a case (0..16).
    ColliderOverlay(u8),
    Circle,
    Rect,
}

impl MeshHandle {
    pub fn id(self) -> u32 {
        match self {
            MeshHandle::TerrainCase(case) => u32::from(case & 0xF),
            MeshHandle::ColliderOverlay(case) => 16 + u32::from(case & 0xF),
            MeshHandle::Circle => 32,
            MeshHandle::Rect => 33,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    Terrain,
    Collider,
    Particle,
    Portal,
    StartPoint,
    EndPoint,
}

impl DrawKind {
    pub fn id(self) -> f32 {
        match self {
            DrawKind::Terrain => DRAW_KIND_TERRAIN,
            DrawKind::Collider => DRAW_KIND_COLLIDER,
            DrawKind::Particle => DRAW_KIND_PARTICLE,
            DrawKind::Portal => DRAW_KIND_PORTAL,
            DrawKind::StartPoint => DRAW_KIND_START_POINT,
            DrawKind::EndPoint => DRAW_KIND_END_POINT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub kind: DrawKind,
    pub mesh: MeshHandle,
    pub world: Mat3,
    pub color: Rgba,
}

impl DrawItem {
    fn new(kind: DrawKind, mesh: MeshHandle, transform: &Transform, color: Rgba) -> Self {
        Self {
            kind,
            mesh,
            world: transform.world,
            color,
        }
    }
}

/// Everything to draw for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderFrame {
    pub items: Vec<DrawItem>,
}

impl RenderFrame {
    /// Collect draw items from the world's resources. Empty terrain cells
    /// are skipped. `debug` adds the collider overlay.
    pub fn from_world(world: &World, debug: bool) -> Self {
        let mut items = Vec::new();

        if let Some(layers) = world.get_resource::<TerrainLayers>() {
            for layer in layers.layers() {
                let color = layer.material().color();
                items.extend(layer.cells().iter().filter(|c| c.case_index != 0).map(|cell| {
                    DrawItem::new(DrawKind::Terrain, MeshHandle::TerrainCase(cell.case_index), &cell.transform, color)
                }));
            }
            if debug {
                for layer in layers.layers() {
                    items.extend(layer.cells().iter().filter(|c| c.case_index != 0).map(|cell| {
                        DrawItem::new(
                            DrawKind::Collider,
                            MeshHandle::ColliderOverlay(cell.case_index),
                            &cell.transform,
                            OVERLAY_COLOR,
                        )
                    }));
                }
            }
        }

        if let Some(pools) = world.get_resource::<FluidPools>() {
            items.extend(pools.iter().map(|(handle, p)| {
                let color = pools.type_config(handle.kind).color;
                DrawItem::new(DrawKind::Particle, MeshHandle::Circle, &p.transform, color)
            }));
        }

        if let Some(portals) = world.get_resource::<PortalRegistry>() {
            items.extend(
                portals
                    .iter()
                    .map(|(_, portal)| DrawItem::new(DrawKind::Portal, MeshHandle::Rect, &portal.transform, portal.color)),
            );
        }

        if let Some(goals) = world.get_resource::<GoalPoints>() {
            items.extend(goals.start_points.iter().map(|point| {
                DrawItem::new(DrawKind::StartPoint, MeshHandle::Rect, &point.transform, START_POINT_COLOR)
            }));
            if let Some(end) = &goals.end_point {
                items.push(DrawItem::new(DrawKind::EndPoint, MeshHandle::Rect, &end.transform, END_POINT_COLOR));
            }
        }

        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count_of(&self, kind: DrawKind) -> usize {
        self.items.iter().filter(|item| item.kind == kind).count()
    }
}

// ============================================================================
// FLAT BUFFER
// ============================================================================

/// Pack a frame into the stable flat buffer. Deterministic for a given frame.
pub fn frame_to_flatbuffer(frame: &RenderFrame) -> Vec<f32> {
    let buffer_size = calculate_buffer_size(frame.items.len());
    let mut buffer = Vec::with_capacity(buffer_size);
    buffer.push(frame.items.len() as f32);

    for item in &frame.items {
        buffer.push(item.kind.id());
        buffer.push(item.mesh.id() as f32);
        buffer.extend_from_slice(&item.world.to_cols_array());
        buffer.extend_from_slice(&item.color.to_array());
    }

    debug_assert_eq!(buffer.len(), buffer_size, "Buffer size mismatch");
    buffer
}

#[inline]
pub fn calculate_buffer_size(item_count: usize) -> usize {
    HEADER_SIZE + item_count * DRAW_STRIDE
}

/// Item count from a flat buffer, `None` if the buffer is empty.
#[inline]
pub fn parse_item_count(buffer: &[f32]) -> Option<usize> {
    buffer.first().map(|count| *count as usize)
}

#[inline]
pub const fn item_offset(index: usize) -> usize {
    HEADER_SIZE + index * DRAW_STRIDE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::FluidType;
    use crate::goal::{GoalDirection, GoalKind, GoalPoint};
    use crate::terrain::{GridGeometry, MarchingSquaresLibrary, TerrainGrid, TerrainMaterial};
    use glam::Vec2;

    fn world() -> World {
        let mut world = World::new();
        let geometry = GridGeometry::centered(Vec2::ZERO, 2, 2, 20.0).unwrap();
        // Only the bottom row of nodes is solid: two cells with case 3.
        let grid = TerrainGrid::build(TerrainMaterial::Stone, geometry, 1.0, MarchingSquaresLibrary::build(), |r, _| {
            if r == 0 {
                1.0
            } else {
                0.0
            }
        })
        .unwrap();
        let mut layers = TerrainLayers::default();
        layers.add(grid).unwrap();
        world.insert_resource(layers);

        let mut pools = FluidPools::default();
        pools.spawn(FluidType::Water, Vec2::new(3.0, 4.0), 5.0);
        world.insert_resource(pools);

        let mut goals = GoalPoints::default();
        goals.add_start_point(GoalPoint::new(Vec2::ZERO, Vec2::splat(50.0), GoalKind::Pipe, GoalDirection::Down));
        world.insert_resource(goals);
        world
    }

    #[test]
    fn test_frame_skips_empty_cells() {
        let frame = RenderFrame::from_world(&world(), false);
        assert_eq!(frame.count_of(DrawKind::Terrain), 2);
        assert_eq!(frame.count_of(DrawKind::Collider), 0);
        assert_eq!(frame.count_of(DrawKind::Particle), 1);
        assert_eq!(frame.count_of(DrawKind::StartPoint), 1);
        assert_eq!(frame.count_of(DrawKind::EndPoint), 0);
        assert_eq!(frame.items[0].mesh, MeshHandle::TerrainCase(3));
    }

    #[test]
    fn test_debug_adds_collider_overlay() {
        let frame = RenderFrame::from_world(&world(), true);
        assert_eq!(frame.count_of(DrawKind::Collider), 2);
        let overlay = frame.items.iter().find(|i| i.kind == DrawKind::Collider).unwrap();
        assert_eq!(overlay.mesh.id(), 19);
    }

    #[test]
    fn test_flatbuffer_layout() {
        let frame = RenderFrame::from_world(&world(), false);
        let buffer = frame_to_flatbuffer(&frame);
        assert_eq!(buffer.len(), calculate_buffer_size(frame.len()));
        assert_eq!(parse_item_count(&buffer), Some(frame.len()));

        // Particle follows the two terrain items.
        let offset = item_offset(2);
        assert_eq!(buffer[offset + FIELD_KIND], DRAW_KIND_PARTICLE);
        assert_eq!(buffer[offset + FIELD_MESH], 32.0);
        // Translation sits in the third matrix column.
        assert_eq!(buffer[offset + FIELD_MATRIX + 6], 3.0);
        assert_eq!(buffer[offset + FIELD_MATRIX + 7], 4.0);
        assert_eq!(
            &buffer[offset + FIELD_COLOR..offset + DRAW_STRIDE],
            &FluidType::Water.default_color().to_array()
        );
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = frame_to_flatbuffer(&RenderFrame::default());
        assert_eq!(buffer, vec![0.0]);
        assert_eq!(parse_item_count(&[]), None);
    }

    #[test]
    fn test_field_offsets_fit_stride() {
        assert_eq!(FIELD_COLOR + 4, DRAW_STRIDE);
        assert_eq!(FIELD_MATRIX + 9, FIELD_COLOR);
    }
}
