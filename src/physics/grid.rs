//! Broad-phase uniform spatial grid over the moving-body set.
//!
//! The cubic room `[-h, h]^3` is partitioned into `N^3` cells of equal
//! side. Cells store indices into the tick's moving-body snapshot and are
//! guarded by per-cell mutexes so workers can insert concurrently.

use std::ops::Range;

use glam::Vec3;
use parking_lot::Mutex;

/// Uniform grid of body-index buckets.
#[derive(Debug)]
pub struct UniformGrid {
    origin: Vec3,
    cell_size: f32,
    cells_per_axis: usize,
    cells: Vec<Mutex<Vec<usize>>>,
}

impl UniformGrid {
    /// Build a grid covering `[-half_extent, half_extent]^3` with cells of
    /// roughly `cell_size` per side (rounded up to a whole cell count).
    pub fn new(half_extent: f32, cell_size: f32) -> Self {
        let world_size = half_extent * 2.0;
        let cells_per_axis = ((world_size / cell_size).ceil() as usize).max(1);
        let total = cells_per_axis * cells_per_axis * cells_per_axis;

        let mut cells = Vec::with_capacity(total);
        cells.resize_with(total, || Mutex::new(Vec::new()));

        Self {
            origin: Vec3::splat(-half_extent),
            cell_size,
            cells_per_axis,
            cells,
        }
    }

    pub fn cells_per_axis(&self) -> usize {
        self.cells_per_axis
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Cell coordinates for a world position, clamped onto the grid.
    fn cell_coords(&self, position: Vec3) -> (usize, usize, usize) {
        let max = (self.cells_per_axis - 1) as i64;
        let coord = |p: f32, o: f32| -> usize {
            let c = ((p - o) / self.cell_size).floor() as i64;
            c.clamp(0, max) as usize
        };
        (
            coord(position.x, self.origin.x),
            coord(position.y, self.origin.y),
            coord(position.z, self.origin.z),
        )
    }

    #[inline]
    fn flatten(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.cells_per_axis + z * self.cells_per_axis * self.cells_per_axis
    }

    /// Flat cell index for a world position.
    pub fn cell_index(&self, position: Vec3) -> usize {
        let (x, y, z) = self.cell_coords(position);
        self.flatten(x, y, z)
    }

    /// Empty every cell in `range`. Workers clear disjoint slices.
    pub fn clear_range(&self, range: Range<usize>) {
        for cell in &self.cells[range] {
            cell.lock().clear();
        }
    }

    /// Insert a moving-body index into the cell containing `position`.
    pub fn insert(&self, body_index: usize, position: Vec3) {
        // Spatial locality spreads inserts out, so this lock is rarely
        // contended.
        self.cells[self.cell_index(position)].lock().push(body_index);
    }

    /// Visit every body index in the 3x3x3 block of cells around
    /// `position`.
    pub fn for_each_neighbor(&self, position: Vec3, mut visit: impl FnMut(usize)) {
        let (cx, cy, cz) = self.cell_coords(position);
        let n = self.cells_per_axis as i64;

        for dz in -1i64..=1 {
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let x = cx as i64 + dx;
                    let y = cy as i64 + dy;
                    let z = cz as i64 + dz;
                    if x < 0 || x >= n || y < 0 || y >= n || z < 0 || z >= n {
                        continue;
                    }
                    let cell = &self.cells[self.flatten(x as usize, y as usize, z as usize)];
                    for &index in cell.lock().iter() {
                        visit(index);
                    }
                }
            }
        }
    }
}
