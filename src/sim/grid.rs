//! Uniform spatial grid over active resources
//!
//! Cells hold resource indices, never copies. Each resource records which
//! cell and slot it occupies so removal is a single swap. Neighbor cell
//! lists for the radar and harvest radii are built once per system because
//! the grid topology never changes while a system lives.

use glam::Vec2;

use super::compact::swap_remove_relink;
use super::resource::Resource;
use super::torus::World;

/// Flattened per-cell neighbor lists (CSR layout)
#[derive(Debug, Clone, Default)]
struct NeighborTable {
    starts: Vec<u32>,
    ids: Vec<u32>,
}

impl NeighborTable {
    fn build(cols: u32, rows: u32, reach_x: u32, reach_y: u32) -> Self {
        let cell_count = (cols * rows) as usize;
        let mut starts = Vec::with_capacity(cell_count + 1);
        let mut ids = Vec::new();
        for cy in 0..rows {
            let ys = ring_axis(cy, reach_y, rows);
            for cx in 0..cols {
                starts.push(ids.len() as u32);
                let xs = ring_axis(cx, reach_x, cols);
                for &y in &ys {
                    for &x in &xs {
                        ids.push(y * cols + x);
                    }
                }
            }
        }
        starts.push(ids.len() as u32);
        Self { starts, ids }
    }

    #[inline]
    fn get(&self, cell: u32) -> &[u32] {
        let c = cell as usize;
        &self.ids[self.starts[c] as usize..self.starts[c + 1] as usize]
    }
}

/// Cell coordinates within `reach` of `center` along one wrapped axis.
/// A ring wider than the axis collapses to every cell exactly once.
fn ring_axis(center: u32, reach: u32, n: u32) -> Vec<u32> {
    if 2 * reach + 1 >= n {
        return (0..n).collect();
    }
    let n = n as i64;
    let reach = reach as i64;
    (-reach..=reach)
        .map(|o| (center as i64 + o).rem_euclid(n) as u32)
        .collect()
}

/// 1 when the last of `n` cells along an axis is cut short, else 0
fn partial_cells(n: u32, cell_size: f32, extent: f32) -> u32 {
    u32::from(n as f32 * cell_size - extent > 1e-3)
}

#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f32,
    cols: u32,
    rows: u32,
    cells: Vec<Vec<u32>>,
    radar: NeighborTable,
    harvest: NeighborTable,
}

impl SpatialGrid {
    /// Build an empty grid plus both neighbor tables for `world`.
    ///
    /// When the world is not a whole number of cells the last column or row
    /// is narrower than `cell_size`, so rings along that axis reach one cell
    /// further.
    pub fn new(world: World, cell_size: f32, radar_range: f32) -> Self {
        let cols = ((world.width / cell_size).ceil() as u32).max(1);
        let rows = ((world.height / cell_size).ceil() as u32).max(1);
        let extra_x = partial_cells(cols, cell_size, world.width);
        let extra_y = partial_cells(rows, cell_size, world.height);
        let radar_reach = (radar_range / cell_size).ceil() as u32 + 1;
        log::debug!(
            "Grid {}x{} cells of {}, radar ring {}",
            cols,
            rows,
            cell_size,
            radar_reach
        );
        Self {
            cell_size,
            cols,
            rows,
            cells: vec![Vec::new(); (cols * rows) as usize],
            radar: NeighborTable::build(cols, rows, radar_reach + extra_x, radar_reach + extra_y),
            harvest: NeighborTable::build(cols, rows, 1 + extra_x, 1 + extra_y),
        }
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Owning cell for a wrapped world position
    #[inline]
    pub fn cell_of(&self, pos: Vec2) -> u32 {
        let cx = ((pos.x / self.cell_size).floor() as i64).clamp(0, self.cols as i64 - 1) as u32;
        let cy = ((pos.y / self.cell_size).floor() as i64).clamp(0, self.rows as i64 - 1) as u32;
        cy * self.cols + cx
    }

    #[inline]
    pub fn cell(&self, cell: u32) -> &[u32] {
        &self.cells[cell as usize]
    }

    #[inline]
    pub fn radar_neighbors(&self, cell: u32) -> &[u32] {
        self.radar.get(cell)
    }

    #[inline]
    pub fn harvest_neighbors(&self, cell: u32) -> &[u32] {
        self.harvest.get(cell)
    }

    /// Total indices stored across all cells
    pub fn len(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Vec::is_empty)
    }

    /// Add resource `idx` to the cell under its position
    pub fn insert(&mut self, resources: &mut [Resource], idx: u32) {
        let cell = self.cell_of(resources[idx as usize].pos);
        let bucket = &mut self.cells[cell as usize];
        let resource = &mut resources[idx as usize];
        resource.grid_cell = Some(cell);
        resource.grid_slot = bucket.len() as u32;
        bucket.push(idx);
    }

    /// Remove resource `idx` from its cell. No-op when it is not in the grid.
    pub fn remove(&mut self, resources: &mut [Resource], idx: u32) {
        let Some(cell) = resources[idx as usize].grid_cell.take() else {
            return;
        };
        let slot = resources[idx as usize].grid_slot as usize;
        swap_remove_relink(&mut self.cells[cell as usize], slot, |&moved, _, to| {
            resources[moved as usize].grid_slot = to as u32;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::resource::ResourceKind;

    fn resource_at(x: f32, y: f32) -> Resource {
        Resource::new(ResourceKind::Common, Vec2::new(x, y), 50.0, 5.0)
    }

    #[test]
    fn test_dimensions_round_up() {
        let grid = SpatialGrid::new(World::new(1050.0, 400.0), 100.0, 150.0);
        assert_eq!(grid.cols(), 11);
        assert_eq!(grid.rows(), 4);
        assert_eq!(grid.cell_count(), 44);
    }

    #[test]
    fn test_insert_and_remove_keep_back_references() {
        let mut grid = SpatialGrid::new(World::new(1000.0, 1000.0), 100.0, 200.0);
        let mut resources = vec![
            resource_at(10.0, 10.0),
            resource_at(20.0, 20.0),
            resource_at(30.0, 30.0),
            resource_at(950.0, 950.0),
        ];
        for idx in 0..resources.len() as u32 {
            grid.insert(&mut resources, idx);
        }
        assert_eq!(grid.cell(0), &[0, 1, 2]);
        assert_eq!(grid.len(), 4);

        grid.remove(&mut resources, 0);
        assert_eq!(resources[0].grid_cell, None);
        assert_eq!(grid.cell(0), &[2, 1]);
        assert_eq!(resources[2].grid_slot, 0);
        assert_eq!(resources[1].grid_slot, 1);

        // Second removal of the same index is ignored
        grid.remove(&mut resources, 0);
        assert_eq!(grid.len(), 3);

        for (idx, r) in resources.iter().enumerate() {
            if let Some(cell) = r.grid_cell {
                assert_eq!(cell, grid.cell_of(r.pos));
                assert_eq!(grid.cell(cell)[r.grid_slot as usize], idx as u32);
            }
        }
    }

    #[test]
    fn test_harvest_neighbors_wrap_around_corner() {
        let grid = SpatialGrid::new(World::new(1000.0, 1000.0), 100.0, 200.0);
        let mut n = grid.harvest_neighbors(0).to_vec();
        n.sort_unstable();
        assert_eq!(n, vec![0, 1, 9, 10, 11, 19, 90, 91, 99]);
    }

    #[test]
    fn test_radar_ring_is_deduplicated_on_small_grids() {
        // Ring of 4 cells each way is wider than a 5x5 grid
        let grid = SpatialGrid::new(World::new(500.0, 500.0), 100.0, 300.0);
        let mut n = grid.radar_neighbors(12).to_vec();
        n.sort_unstable();
        n.dedup();
        assert_eq!(n.len(), 25);
        assert_eq!(grid.radar_neighbors(12).len(), 25);
    }

    #[test]
    fn test_partial_last_column_widens_harvest_ring() {
        // 1010 wide: ten full columns plus a 10-unit sliver
        let grid = SpatialGrid::new(World::new(1010.0, 1000.0), 100.0, 150.0);
        assert_eq!(grid.cols(), 11);
        let cell = grid.cell_of(Vec2::new(999.0, 500.0));
        let neighbors = grid.harvest_neighbors(cell);
        assert!(neighbors.contains(&grid.cell_of(Vec2::new(5.0, 500.0))));
        // Rows divide evenly, so only the column reach grows
        assert_eq!(neighbors.len(), 5 * 3);
    }

    #[test]
    fn test_radar_ring_size() {
        let grid = SpatialGrid::new(World::new(5000.0, 5000.0), 100.0, 150.0);
        // ceil(150 / 100) + 1 = 3 cells each way
        assert_eq!(grid.radar_neighbors(0).len(), 49);
    }

    #[test]
    fn test_cell_of_clamps_edge_positions() {
        let grid = SpatialGrid::new(World::new(1000.0, 1000.0), 100.0, 100.0);
        assert_eq!(grid.cell_of(Vec2::new(999.999, 999.999)), 99);
        assert_eq!(grid.cell_of(Vec2::new(1000.0, 0.0)), 9);
    }
}
