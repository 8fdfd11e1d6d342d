//! Marching-squares terrain.
//!
//! A terrain layer is a grid of density nodes (`rows + 1` by `cols + 1`).
//! Each cell reads its four corner nodes, builds a 4-bit case index and copies
//! the matching mesh shape and collider set out of a shared, immutable
//! [`MarchingSquaresLibrary`]. Destroying terrain zeroes nodes and rebuilds
//! every cell before the next collision query.

use crate::collider::Collider2D;
use crate::components::{Rgba, Transform};
use crate::error::SimError;
use bevy_ecs::prelude::*;
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// ============================================================================
// CASE LIBRARY
// ============================================================================

const L: f32 = -0.5;
const R: f32 = 0.5;
const B: f32 = -0.5;
const T: f32 = 0.5;
const M: f32 = 0.0;

const BL: Vec2 = Vec2::new(L, B);
const BR: Vec2 = Vec2::new(R, B);
const TL: Vec2 = Vec2::new(L, T);
const TR: Vec2 = Vec2::new(R, T);
const ML: Vec2 = Vec2::new(L, M);
const MR: Vec2 = Vec2::new(R, M);
const MB: Vec2 = Vec2::new(M, B);
const MT: Vec2 = Vec2::new(M, T);

/// Corner weights of the case index.
pub const TOP_LEFT_BIT: u8 = 8;
pub const TOP_RIGHT_BIT: u8 = 4;
pub const BOTTOM_RIGHT_BIT: u8 = 2;
pub const BOTTOM_LEFT_BIT: u8 = 1;

pub const CASE_COUNT: usize = 16;

/// Filled triangles per case, in the unit cell frame.
const CASE_TRIANGLES: [&[[Vec2; 3]]; CASE_COUNT] = [
    &[],
    &[[BL, MB, ML]],
    &[[BR, MR, MB]],
    &[[BL, BR, ML], [BR, MR, ML]],
    &[[TR, MT, MR]],
    &[[BL, MB, ML], [TR, MT, MR]],
    &[[MB, BR, MT], [BR, TR, MT]],
    &[[BL, BR, ML], [BR, TR, ML], [TR, MT, ML]],
    &[[TL, ML, MT]],
    &[[BL, MB, TL], [MB, MT, TL]],
    &[[BR, MR, MB], [TL, ML, MT]],
    &[[BL, BR, TL], [BR, MR, TL], [MR, MT, TL]],
    &[[ML, MR, TL], [MR, TR, TL]],
    &[[BL, MB, TL], [MB, MR, TL], [MR, TR, TL]],
    &[[MB, BR, ML], [BR, TR, ML], [TR, TL, ML]],
    &[[BL, BR, TL], [BR, TR, TL]],
];

/// Cases whose solid region is a rectangle collide as a single box.
fn case_box(case: usize) -> Option<Collider2D> {
    match case {
        3 => Some(Collider2D::aabb(Vec2::new(0.0, -0.25), Vec2::new(1.0, 0.5))),
        6 => Some(Collider2D::aabb(Vec2::new(0.25, 0.0), Vec2::new(0.5, 1.0))),
        9 => Some(Collider2D::aabb(Vec2::new(-0.25, 0.0), Vec2::new(0.5, 1.0))),
        12 => Some(Collider2D::aabb(Vec2::new(0.0, 0.25), Vec2::new(1.0, 0.5))),
        15 => Some(Collider2D::aabb(Vec2::ZERO, Vec2::ONE)),
        _ => None,
    }
}

/// Render shape of one marching-squares case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseMesh {
    pub triangles: Vec<[Vec2; 3]>,
}

/// The 16 mesh shapes and 16 collider sets, built once per level load and
/// shared read-only by every terrain layer of that level.
#[derive(Debug, Clone, PartialEq)]
pub struct MarchingSquaresLibrary {
    meshes: Vec<CaseMesh>,
    colliders: [[Collider2D; 3]; CASE_COUNT],
}

impl MarchingSquaresLibrary {
    pub fn build() -> Arc<Self> {
        let meshes = CASE_TRIANGLES
            .iter()
            .map(|tris| CaseMesh {
                triangles: tris.to_vec(),
            })
            .collect();

        let mut colliders = [[Collider2D::Empty; 3]; CASE_COUNT];
        for (case, slots) in colliders.iter_mut().enumerate() {
            if let Some(solid) = case_box(case) {
                slots[0] = solid;
                continue;
            }
            for (slot, [a, b, c]) in slots.iter_mut().zip(CASE_TRIANGLES[case]) {
                *slot = Collider2D::triangle(*a, *b, *c);
            }
        }

        Arc::new(Self { meshes, colliders })
    }

    pub fn mesh(&self, case: u8) -> &CaseMesh {
        &self.meshes[case as usize & 0xF]
    }

    /// All 16 case meshes, indexed by case.
    pub fn meshes(&self) -> &[CaseMesh] {
        &self.meshes
    }

    pub fn colliders(&self, case: u8) -> [Collider2D; 3] {
        self.colliders[case as usize & 0xF]
    }
}

// ============================================================================
// MATERIAL & GEOMETRY
// ============================================================================

/// Terrain material of a whole layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainMaterial {
    Dirt,
    Stone,
}

impl TerrainMaterial {
    /// Whether player edits remove this material.
    pub fn is_destructible(&self) -> bool {
        matches!(self, TerrainMaterial::Dirt)
    }

    pub fn color(&self) -> Rgba {
        match self {
            TerrainMaterial::Dirt => Rgba::rgb(0.59, 0.39, 0.29),
            TerrainMaterial::Stone => Rgba::rgb(0.28, 0.28, 0.32),
        }
    }
}

/// Placement and resolution of a terrain grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub rows: usize,
    pub cols: usize,
    pub cell_size: f32,
    /// World position of node (0, 0).
    pub bottom_left: Vec2,
}

impl GridGeometry {
    /// Grid of `rows` x `cols` cells centred on `center`.
    pub fn centered(center: Vec2, rows: usize, cols: usize, cell_size: f32) -> Result<Self, SimError> {
        if rows == 0 || cols == 0 {
            return Err(SimError::EmptyGrid { rows, cols });
        }
        if !(cell_size > 0.0) || !cell_size.is_finite() {
            return Err(SimError::InvalidCellSize(cell_size));
        }
        let half = Vec2::new(cols as f32 * cell_size, rows as f32 * cell_size) * 0.5;
        Ok(Self {
            rows,
            cols,
            cell_size,
            bottom_left: center - half,
        })
    }

    #[inline]
    pub fn node_rows(&self) -> usize {
        self.rows + 1
    }

    #[inline]
    pub fn node_cols(&self) -> usize {
        self.cols + 1
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }

    #[inline]
    pub fn cell_index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    #[inline]
    pub fn node_index(&self, row: usize, col: usize) -> usize {
        row * self.node_cols() + col
    }

    /// Cell containing a world point, or `None` outside the grid.
    pub fn world_to_cell(&self, pos: Vec2) -> Option<(usize, usize)> {
        let local = (pos - self.bottom_left) / self.cell_size;
        if !local.is_finite() || local.x < 0.0 || local.y < 0.0 {
            return None;
        }
        let (col, row) = (local.x.floor() as usize, local.y.floor() as usize);
        (row < self.rows && col < self.cols).then_some((row, col))
    }

    /// Node nearest to a world point, or `None` outside the node lattice.
    pub fn nearest_node(&self, pos: Vec2) -> Option<(usize, usize)> {
        let local = ((pos - self.bottom_left) / self.cell_size).round();
        if !local.is_finite() || local.x < 0.0 || local.y < 0.0 {
            return None;
        }
        let (col, row) = (local.x as usize, local.y as usize);
        (row < self.node_rows() && col < self.node_cols()).then_some((row, col))
    }

    pub fn cell_center(&self, row: usize, col: usize) -> Vec2 {
        self.bottom_left + Vec2::new(col as f32 + 0.5, row as f32 + 0.5) * self.cell_size
    }

    pub fn node_position(&self, row: usize, col: usize) -> Vec2 {
        self.bottom_left + Vec2::new(col as f32, row as f32) * self.cell_size
    }

    /// World-space size of the whole grid.
    pub fn extent(&self) -> Vec2 {
        Vec2::new(self.cols as f32, self.rows as f32) * self.cell_size
    }
}

// ============================================================================
// TERRAIN GRID
// ============================================================================

/// One marching-squares cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainCell {
    pub transform: Transform,
    pub case_index: u8,
    pub colliders: [Collider2D; 3],
}

/// A single terrain layer: density nodes plus derived cells.
#[derive(Debug, Clone)]
pub struct TerrainGrid {
    material: TerrainMaterial,
    geometry: GridGeometry,
    threshold: f32,
    nodes: Vec<f32>,
    cells: Vec<TerrainCell>,
    library: Arc<MarchingSquaresLibrary>,
    /// Bumped on every geometry rebuild.
    revision: u64,
}

impl TerrainGrid {
    /// Build a layer, sampling each node density from `density(row, col)`.
    pub fn build(
        material: TerrainMaterial,
        geometry: GridGeometry,
        threshold: f32,
        library: Arc<MarchingSquaresLibrary>,
        mut density: impl FnMut(usize, usize) -> f32,
    ) -> Result<Self, SimError> {
        if geometry.rows == 0 || geometry.cols == 0 {
            return Err(SimError::EmptyGrid {
                rows: geometry.rows,
                cols: geometry.cols,
            });
        }

        let mut nodes = Vec::with_capacity(geometry.node_rows() * geometry.node_cols());
        for row in 0..geometry.node_rows() {
            for col in 0..geometry.node_cols() {
                nodes.push(density(row, col));
            }
        }

        let mut cells = Vec::with_capacity(geometry.cell_count());
        for row in 0..geometry.rows {
            for col in 0..geometry.cols {
                cells.push(TerrainCell {
                    transform: Transform::new(
                        geometry.cell_center(row, col),
                        Vec2::splat(geometry.cell_size),
                        0.0,
                    ),
                    case_index: 0,
                    colliders: [Collider2D::Empty; 3],
                });
            }
        }

        let mut grid = Self {
            material,
            geometry,
            threshold,
            nodes,
            cells,
            library,
            revision: 0,
        };
        grid.recompute_cell_geometry();
        Ok(grid)
    }

    /// Layer with every node randomly solid or empty.
    pub fn random(
        material: TerrainMaterial,
        geometry: GridGeometry,
        threshold: f32,
        library: Arc<MarchingSquaresLibrary>,
        rng: &mut impl Rng,
    ) -> Result<Self, SimError> {
        Self::build(material, geometry, threshold, library, |_, _| {
            if rng.gen_bool(0.5) {
                1.0
            } else {
                0.0
            }
        })
    }

    pub fn material(&self) -> TerrainMaterial {
        self.material
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn library(&self) -> &Arc<MarchingSquaresLibrary> {
        &self.library
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn cells(&self) -> &[TerrainCell] {
        &self.cells
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&TerrainCell> {
        if row < self.geometry.rows && col < self.geometry.cols {
            self.cells.get(self.geometry.cell_index(row, col))
        } else {
            None
        }
    }

    pub fn node(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.geometry.node_rows() && col < self.geometry.node_cols() {
            self.nodes.get(self.geometry.node_index(row, col)).copied()
        } else {
            None
        }
    }

    pub fn nodes(&self) -> &[f32] {
        &self.nodes
    }

    /// Case index of a cell from its four corner nodes.
    pub fn case_index(&self, row: usize, col: usize) -> u8 {
        marching_case(&self.nodes, self.geometry.node_cols(), self.threshold, row, col)
    }

    /// Rebuild every cell's case index and collider set from the nodes.
    ///
    /// Deterministic in the node values, so calling it twice in a row gives
    /// identical cells.
    pub fn recompute_cell_geometry(&mut self) {
        let nodes = &self.nodes;
        let library = &*self.library;
        let node_cols = self.geometry.node_cols();
        let cols = self.geometry.cols;
        let threshold = self.threshold;

        let assign = |(index, cell): (usize, &mut TerrainCell)| {
            let case = marching_case(nodes, node_cols, threshold, index / cols, index % cols);
            cell.case_index = case;
            cell.colliders = library.colliders(case);
        };

        #[cfg(feature = "parallel")]
        self.cells.par_iter_mut().enumerate().for_each(assign);
        #[cfg(not(feature = "parallel"))]
        self.cells.iter_mut().enumerate().for_each(assign);

        self.revision += 1;
    }

    /// Destroy terrain around a world point.
    ///
    /// A positive radius clears every node within it. A zero (or negative)
    /// radius snaps to the single nearest node. Points outside the grid are
    /// ignored. Returns whether any node changed.
    pub fn destroy_at(&mut self, pos: Vec2, radius: f32) -> bool {
        let changed = if radius > 0.0 {
            self.clear_nodes_in_radius(pos, radius)
        } else {
            self.clear_nearest_node(pos)
        };
        if changed {
            self.recompute_cell_geometry();
        }
        changed
    }

    fn clear_nearest_node(&mut self, pos: Vec2) -> bool {
        let Some((row, col)) = self.geometry.nearest_node(pos) else {
            return false;
        };
        let index = self.geometry.node_index(row, col);
        let changed = self.nodes[index] != 0.0;
        self.nodes[index] = 0.0;
        changed
    }

    fn clear_nodes_in_radius(&mut self, pos: Vec2, radius: f32) -> bool {
        let radius_sq = radius * radius;
        let mut changed = false;
        for row in 0..self.geometry.node_rows() {
            for col in 0..self.geometry.node_cols() {
                if self.geometry.node_position(row, col).distance_squared(pos) > radius_sq {
                    continue;
                }
                let index = self.geometry.node_index(row, col);
                if self.nodes[index] != 0.0 {
                    self.nodes[index] = 0.0;
                    changed = true;
                }
            }
        }
        changed
    }
}

fn marching_case(nodes: &[f32], node_cols: usize, threshold: f32, row: usize, col: usize) -> u8 {
    let solid = |r: usize, c: usize| nodes[r * node_cols + c] >= threshold;
    let mut case = 0;
    if solid(row + 1, col) {
        case |= TOP_LEFT_BIT;
    }
    if solid(row + 1, col + 1) {
        case |= TOP_RIGHT_BIT;
    }
    if solid(row, col + 1) {
        case |= BOTTOM_RIGHT_BIT;
    }
    if solid(row, col) {
        case |= BOTTOM_LEFT_BIT;
    }
    case
}

// ============================================================================
// LAYER SET
// ============================================================================

/// All terrain layers of the running level. Layers share one grid geometry.
#[derive(Resource, Debug, Default)]
pub struct TerrainLayers {
    layers: Vec<TerrainGrid>,
    dirty: bool,
}

impl TerrainLayers {
    /// Add a layer. Every layer after the first must match its geometry.
    pub fn add(&mut self, grid: TerrainGrid) -> Result<usize, SimError> {
        if let Some(primary) = self.geometry() {
            if primary != grid.geometry {
                return Err(SimError::LayerMismatch);
            }
        }
        self.layers.push(grid);
        self.dirty = true;
        Ok(self.layers.len() - 1)
    }

    pub fn geometry(&self) -> Option<GridGeometry> {
        self.layers.first().map(|layer| layer.geometry)
    }

    pub fn layers(&self) -> &[TerrainGrid] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&TerrainGrid> {
        self.layers.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Destroy destructible layers around a point. Indestructible materials
    /// are left untouched.
    pub fn destroy_at(&mut self, pos: Vec2, radius: f32) -> bool {
        let mut changed = false;
        for layer in self.layers.iter_mut().filter(|l| l.material.is_destructible()) {
            changed |= layer.destroy_at(pos, radius);
        }
        if changed {
            log::debug!("terrain destroyed at ({:.1}, {:.1}) r={:.1}", pos.x, pos.y, radius);
            self.dirty = true;
        }
        changed
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Read and clear the modified flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Serializable view of one terrain layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainLayerSnapshot {
    pub material: TerrainMaterial,
    pub rows: usize,
    pub cols: usize,
    pub cell_size: f32,
    pub origin_x: f32,
    pub origin_y: f32,
    pub revision: u64,
    /// Row-major case index per cell.
    pub cases: Vec<u8>,
}

/// Serializable view of all terrain layers.
///
/// `case_meshes` is the shared mesh table in unit-cell space, indexed by
/// case. Empty when no layer is loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerrainSnapshot {
    pub case_meshes: Vec<CaseMesh>,
    pub layers: Vec<TerrainLayerSnapshot>,
}

impl TerrainSnapshot {
    pub fn from_layers(layers: &TerrainLayers) -> Self {
        Self {
            case_meshes: layers
                .layers()
                .first()
                .map(|grid| grid.library().meshes().to_vec())
                .unwrap_or_default(),
            layers: layers
                .layers()
                .iter()
                .map(|grid| TerrainLayerSnapshot {
                    material: grid.material,
                    rows: grid.geometry.rows,
                    cols: grid.geometry.cols,
                    cell_size: grid.geometry.cell_size,
                    origin_x: grid.geometry.bottom_left.x,
                    origin_y: grid.geometry.bottom_left.y,
                    revision: grid.revision,
                    cases: grid.cells.iter().map(|c| c.case_index).collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn grid(rows: usize, cols: usize, density: impl FnMut(usize, usize) -> f32) -> TerrainGrid {
        let geometry = GridGeometry::centered(Vec2::ZERO, rows, cols, 20.0).unwrap();
        TerrainGrid::build(TerrainMaterial::Dirt, geometry, 1.0, MarchingSquaresLibrary::build(), density)
            .unwrap()
    }

    #[test]
    fn test_full_cell_is_single_box() {
        let g = grid(1, 1, |_, _| 1.0);
        let cell = g.cell(0, 0).unwrap();
        assert_eq!(cell.case_index, 15);
        assert_eq!(cell.colliders[0], Collider2D::aabb(Vec2::ZERO, Vec2::ONE));
        assert!(cell.colliders[1].is_empty());
        assert!(cell.colliders[2].is_empty());
    }

    #[test]
    fn test_corner_weights() {
        // node (row, col): (1,0)=TL, (1,1)=TR, (0,1)=BR, (0,0)=BL
        let cases = [((1, 0), 8), ((1, 1), 4), ((0, 1), 2), ((0, 0), 1)];
        for ((nr, nc), expected) in cases {
            let g = grid(1, 1, |r, c| if (r, c) == (nr, nc) { 1.0 } else { 0.0 });
            assert_eq!(g.case_index(0, 0), expected);
            assert_eq!(g.cell(0, 0).unwrap().case_index, expected);
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let g = grid(1, 1, |_, _| 1.0);
        assert_eq!(g.case_index(0, 0), 15);
        let g = grid(1, 1, |_, _| 0.999);
        assert_eq!(g.case_index(0, 0), 0);
    }

    #[test]
    fn test_library_tables() {
        let lib = MarchingSquaresLibrary::build();
        assert!(lib.colliders(0).iter().all(Collider2D::is_empty));
        assert!(lib.mesh(0).triangles.is_empty());
        assert_eq!(
            lib.colliders(3)[0],
            Collider2D::aabb(Vec2::new(0.0, -0.25), Vec2::new(1.0, 0.5))
        );
        assert_eq!(
            lib.colliders(12)[0],
            Collider2D::aabb(Vec2::new(0.0, 0.25), Vec2::new(1.0, 0.5))
        );
        assert_eq!(lib.colliders(1)[0], Collider2D::triangle(BL, MB, ML));
        assert!(lib.colliders(1)[1].is_empty());
        assert!(lib.colliders(7).iter().all(|c| matches!(c, Collider2D::Triangle(_))));
        assert_eq!(lib.mesh(15).triangles.len(), 2);
        assert_eq!(lib.mesh(5).triangles.len(), 2);
    }

    #[test]
    fn test_cell_transforms() {
        let g = grid(2, 4, |_, _| 0.0);
        // 4 cols * 20 wide, 2 rows * 20 tall, centred on the origin.
        assert_eq!(g.geometry().bottom_left, Vec2::new(-40.0, -20.0));
        let cell = g.cell(1, 2).unwrap();
        assert_eq!(cell.transform.position, Vec2::new(10.0, 10.0));
        assert_eq!(cell.transform.scale, Vec2::splat(20.0));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut rng = SmallRng::seed_from_u64(7);
        let geometry = GridGeometry::centered(Vec2::ZERO, 6, 9, 10.0).unwrap();
        let mut g = TerrainGrid::random(
            TerrainMaterial::Dirt,
            geometry,
            1.0,
            MarchingSquaresLibrary::build(),
            &mut rng,
        )
        .unwrap();
        g.recompute_cell_geometry();
        let first = g.cells().to_vec();
        g.recompute_cell_geometry();
        assert_eq!(first, g.cells());
    }

    #[test]
    fn test_destroy_snaps_to_nearest_node() {
        let mut g = grid(2, 2, |_, _| 1.0);
        // Node (1, 1) sits at the origin.
        assert!(g.destroy_at(Vec2::new(4.0, -3.0), 0.0));
        assert_eq!(g.node(1, 1), Some(0.0));
        assert_eq!(g.nodes().iter().filter(|&&n| n == 0.0).count(), 1);
        assert_eq!(g.case_index(0, 0), 15 - TOP_RIGHT_BIT);
        assert_eq!(g.case_index(1, 1), 15 - BOTTOM_LEFT_BIT);
        // Already empty: no change reported.
        assert!(!g.destroy_at(Vec2::ZERO, 0.0));
    }

    #[test]
    fn test_destroy_out_of_bounds_is_ignored() {
        let mut g = grid(2, 2, |_, _| 1.0);
        let revision = g.revision();
        assert!(!g.destroy_at(Vec2::new(-500.0, 0.0), 0.0));
        assert!(!g.destroy_at(Vec2::new(0.0, 500.0), 0.0));
        assert!(!g.destroy_at(Vec2::new(f32::NAN, 0.0), 0.0));
        assert!(!g.destroy_at(Vec2::new(-500.0, -500.0), 5.0));
        assert_eq!(g.revision(), revision);
        assert!(g.nodes().iter().all(|&n| n == 1.0));
    }

    #[test]
    fn test_destroy_radius_clears_nodes_within() {
        let mut g = grid(4, 4, |_, _| 1.0);
        // Origin is node (2, 2); a 20 radius reaches its 4 direct neighbours.
        assert!(g.destroy_at(Vec2::ZERO, 20.0));
        let cleared = g.nodes().iter().filter(|&&n| n == 0.0).count();
        assert_eq!(cleared, 5);
        assert_eq!(g.node(2, 4), Some(1.0));
        assert_eq!(g.node(3, 3), Some(1.0));
    }

    #[test]
    fn test_zero_radius_matches_tiny_radius_on_node() {
        let mut snapped = grid(3, 3, |_, _| 1.0);
        let mut scanned = snapped.clone();
        let node = snapped.geometry().node_position(2, 1);
        snapped.destroy_at(node, 0.0);
        scanned.destroy_at(node, 1e-3);
        assert_eq!(snapped.nodes(), scanned.nodes());
        assert_eq!(snapped.cells(), scanned.cells());
    }

    #[test]
    fn test_build_rejects_bad_geometry() {
        assert!(matches!(
            GridGeometry::centered(Vec2::ZERO, 0, 5, 10.0),
            Err(SimError::EmptyGrid { rows: 0, cols: 5 })
        ));
        assert!(matches!(
            GridGeometry::centered(Vec2::ZERO, 5, 5, 0.0),
            Err(SimError::InvalidCellSize(_))
        ));
    }

    #[test]
    fn test_layers_share_geometry_and_protect_stone() {
        let lib = MarchingSquaresLibrary::build();
        let geometry = GridGeometry::centered(Vec2::ZERO, 2, 2, 20.0).unwrap();
        let dirt = TerrainGrid::build(TerrainMaterial::Dirt, geometry, 1.0, lib.clone(), |_, _| 1.0).unwrap();
        let stone = TerrainGrid::build(TerrainMaterial::Stone, geometry, 1.0, lib.clone(), |_, _| 1.0).unwrap();

        let mut layers = TerrainLayers::default();
        layers.add(dirt).unwrap();
        layers.add(stone).unwrap();
        assert!(layers.take_dirty());

        assert!(layers.destroy_at(Vec2::ZERO, 0.0));
        assert_eq!(layers.layer(0).unwrap().node(1, 1), Some(0.0));
        assert_eq!(layers.layer(1).unwrap().node(1, 1), Some(1.0));
        assert!(layers.is_dirty());

        let other = GridGeometry::centered(Vec2::ZERO, 3, 2, 20.0).unwrap();
        let mismatched = TerrainGrid::build(TerrainMaterial::Stone, other, 1.0, lib, |_, _| 1.0).unwrap();
        assert!(matches!(layers.add(mismatched), Err(SimError::LayerMismatch)));
    }

    #[test]
    fn test_world_to_cell() {
        let g = grid(2, 4, |_, _| 0.0);
        let geometry = g.geometry();
        assert_eq!(geometry.world_to_cell(Vec2::new(-39.0, -19.0)), Some((0, 0)));
        assert_eq!(geometry.world_to_cell(Vec2::new(39.0, 19.0)), Some((1, 3)));
        assert_eq!(geometry.world_to_cell(Vec2::new(41.0, 0.0)), None);
        assert_eq!(geometry.world_to_cell(Vec2::new(0.0, -21.0)), None);
    }

    #[test]
    fn test_snapshot_lists_cases() {
        let mut layers = TerrainLayers::default();
        layers.add(grid(2, 3, |_, _| 1.0)).unwrap();
        let snapshot = TerrainSnapshot::from_layers(&layers);
        assert_eq!(snapshot.layers.len(), 1);
        assert_eq!(snapshot.layers[0].cases, vec![15; 6]);
        assert_eq!(snapshot.layers[0].material, TerrainMaterial::Dirt);
        assert_eq!(snapshot.case_meshes.len(), CASE_COUNT);
        assert_eq!(snapshot.case_meshes[15].triangles.len(), 2);

        assert!(TerrainSnapshot::from_layers(&TerrainLayers::default()).case_meshes.is_empty());
    }
}
