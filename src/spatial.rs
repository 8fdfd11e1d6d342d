//! Spatial partitioning for particle collision queries.
//!
//! Particles are bucketed by the terrain cell that contains them. Buckets are
//! a flat vector indexed like terrain cells, so a particle's bucket index is
//! also the index of the terrain cell it sits in. A fresh set of buckets is
//! built for every substep and dropped afterwards.

use crate::fluid::{FluidPools, ParticleHandle};
use crate::terrain::GridGeometry;
use glam::Vec2;

/// Per-substep spatial hash of particle handles over the terrain grid.
#[derive(Debug)]
pub struct ParticleBuckets {
    geometry: GridGeometry,
    buckets: Vec<Vec<ParticleHandle>>,
    /// Indices of non-empty buckets in ascending order.
    occupied: Vec<usize>,
    /// Particles outside the grid, which collide with nothing this substep.
    outside: usize,
}

impl ParticleBuckets {
    /// Bucket every live particle. Pools are visited in type order, so each
    /// bucket lists handles in ascending order.
    pub fn build(geometry: GridGeometry, pools: &FluidPools) -> Self {
        let mut buckets = vec![Vec::new(); geometry.cell_count()];
        let mut outside = 0;

        for (handle, particle) in pools.iter() {
            match geometry.world_to_cell(particle.position()) {
                Some((row, col)) => buckets[geometry.cell_index(row, col)].push(handle),
                None => outside += 1,
            }
        }

        let occupied = buckets
            .iter()
            .enumerate()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(i, _)| i)
            .collect();

        Self {
            geometry,
            buckets,
            occupied,
            outside,
        }
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Bucket index containing a world point.
    #[inline]
    pub fn world_to_cell(&self, pos: Vec2) -> Option<usize> {
        self.geometry
            .world_to_cell(pos)
            .map(|(row, col)| self.geometry.cell_index(row, col))
    }

    pub fn bucket(&self, index: usize) -> &[ParticleHandle] {
        self.buckets.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn occupied(&self) -> &[usize] {
        &self.occupied
    }

    /// The bucket itself and its in-bounds 3x3 neighbours, bottom row first.
    pub fn neighborhood(&self, index: usize) -> impl Iterator<Item = usize> {
        let cols = self.geometry.cols as isize;
        let rows = self.geometry.rows as isize;
        let row = index as isize / cols;
        let col = index as isize % cols;

        (-1..=1).flat_map(move |dr| {
            (-1..=1).filter_map(move |dc| {
                let (r, c) = (row + dr, col + dc);
                (r >= 0 && r < rows && c >= 0 && c < cols).then(|| (r * cols + c) as usize)
            })
        })
    }

    /// Number of bucketed particles.
    pub fn total_count(&self) -> usize {
        self.occupied.iter().map(|&i| self.buckets[i].len()).sum()
    }

    pub fn outside_count(&self) -> usize {
        self.outside
    }
}
