//! Resource pool
//!
//! Dense store of resources plus a swap-compacted list of the active ones.
//! A depleted resource leaves the active list and the grid but keeps its
//! slot in the store until the next system spawn, so indices held by probes
//! stay in bounds and only need a liveness check.

use glam::Vec2;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use super::compact::swap_remove_relink;
use super::grid::SpatialGrid;
use super::torus::World;
use crate::config::SimConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    Common,
    Rich,
}

impl ResourceKind {
    fn radius_factor(self, config: &SimConfig) -> f32 {
        match self {
            ResourceKind::Common => config.common_radius_factor,
            ResourceKind::Rich => config.rich_radius_factor,
        }
    }

    fn clustered_probability(self, config: &SimConfig) -> f32 {
        match self {
            ResourceKind::Common => config.common_clustered_probability,
            ResourceKind::Rich => config.rich_clustered_probability,
        }
    }

    fn capacity(self, config: &SimConfig) -> crate::FloatRange {
        match self {
            ResourceKind::Common => config.common_capacity,
            ResourceKind::Rich => config.rich_capacity,
        }
    }

    /// Display radius for a resource of this kind and capacity
    pub fn radius_for(self, config: &SimConfig, capacity: f32) -> f32 {
        config.resource_base_radius + capacity.max(0.0).sqrt() * self.radius_factor(config)
    }
}

/// A harvestable deposit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub pos: Vec2,
    pub max_amt: f32,
    pub amt: f32,
    pub radius: f32,
    #[serde(skip)]
    pub(crate) grid_cell: Option<u32>,
    #[serde(skip)]
    pub(crate) grid_slot: u32,
    #[serde(skip)]
    pub(crate) active_slot: Option<u32>,
}

impl Resource {
    pub fn new(kind: ResourceKind, pos: Vec2, max_amt: f32, radius: f32) -> Self {
        Self {
            kind,
            pos,
            max_amt,
            amt: max_amt,
            radius,
            grid_cell: None,
            grid_slot: 0,
            active_slot: None,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active_slot.is_some()
    }

    pub fn fill_fraction(&self) -> f32 {
        if self.max_amt > 0.0 {
            self.amt / self.max_amt
        } else {
            0.0
        }
    }
}

/// Gaussian placement hotspot
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cluster {
    pub center: Vec2,
    pub weight: f32,
}

/// Result of one harvest transfer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HarvestOutcome {
    pub taken: f32,
    pub depleted: bool,
}

#[derive(Debug, Clone)]
pub struct ResourcePool {
    world: World,
    resources: Vec<Resource>,
    active: Vec<u32>,
    grid: SpatialGrid,
    clusters: Vec<Cluster>,
    initial_total: f64,
    remaining_total: f64,
}

impl ResourcePool {
    /// Empty pool with a grid sized for `world`
    pub fn new(config: &SimConfig, world: World) -> Self {
        Self {
            world,
            resources: Vec::new(),
            active: Vec::new(),
            grid: SpatialGrid::new(world, config.cell_size, config.radar_range),
            clusters: Vec::new(),
            initial_total: 0.0,
            remaining_total: 0.0,
        }
    }

    /// Pool holding exactly the given `(kind, position, capacity)` deposits
    pub fn from_layout(config: &SimConfig, world: World, layout: &[(ResourceKind, Vec2, f32)]) -> Self {
        let mut pool = Self::new(config, world);
        for &(kind, pos, capacity) in layout {
            let radius = kind.radius_for(config, capacity);
            pool.push_resource(Resource::new(kind, world.wrap_position(pos), capacity, radius));
        }
        pool.remaining_total = pool.initial_total;
        pool
    }

    /// Discard everything and generate a fresh resource field
    pub fn spawn_system<R: Rng + ?Sized>(&mut self, config: &SimConfig, rng: &mut R) {
        self.resources.clear();
        self.active.clear();
        self.grid = SpatialGrid::new(self.world, config.cell_size, config.radar_range);
        self.initial_total = 0.0;

        self.clusters = (0..config.cluster_count)
            .map(|_| Cluster {
                center: self.world.random_point(rng),
                weight: config.cluster_weight.sample(rng),
            })
            .collect();
        let total_weight: f32 = self.clusters.iter().map(|c| c.weight.max(0.0)).sum();

        self.resources.reserve(config.common_count + config.rich_count);
        for (kind, count) in [
            (ResourceKind::Common, config.common_count),
            (ResourceKind::Rich, config.rich_count),
        ] {
            for _ in 0..count {
                let pos = self.placement(kind, config, total_weight, rng);
                let capacity = kind.capacity(config).sample(rng);
                let radius = kind.radius_for(config, capacity);
                self.push_resource(Resource::new(kind, pos, capacity, radius));
            }
        }
        self.remaining_total = self.initial_total;

        log::info!(
            "Spawned system: {} resources in {} clusters, total {:.0}",
            self.resources.len(),
            self.clusters.len(),
            self.initial_total
        );
    }

    fn placement<R: Rng + ?Sized>(
        &self,
        kind: ResourceKind,
        config: &SimConfig,
        total_weight: f32,
        rng: &mut R,
    ) -> Vec2 {
        let clustered = rng.random::<f32>() < kind.clustered_probability(config);
        match self.pick_cluster(total_weight, rng) {
            Some(cluster) if clustered => {
                let gx: f32 = StandardNormal.sample(rng);
                let gy: f32 = StandardNormal.sample(rng);
                self.world
                    .wrap_position(cluster.center + Vec2::new(gx, gy) * config.cluster_spread)
            }
            _ => self.world.random_point(rng),
        }
    }

    /// Cumulative-weight pick; `None` when there is nothing to pick from
    fn pick_cluster<R: Rng + ?Sized>(&self, total_weight: f32, rng: &mut R) -> Option<Cluster> {
        if self.clusters.is_empty() || total_weight <= 0.0 {
            return None;
        }
        let mut roll = rng.random::<f32>() * total_weight;
        for cluster in &self.clusters {
            let weight = cluster.weight.max(0.0);
            if roll < weight {
                return Some(*cluster);
            }
            roll -= weight;
        }
        self.clusters.last().copied()
    }

    fn push_resource(&mut self, resource: Resource) {
        let idx = self.resources.len() as u32;
        self.initial_total += resource.max_amt as f64;
        self.resources.push(resource);
        self.activate(idx);
    }

    /// Put a resource into the active list and the grid
    pub fn activate(&mut self, idx: u32) {
        let Some(resource) = self.resources.get_mut(idx as usize) else {
            return;
        };
        if resource.is_active() {
            return;
        }
        resource.active_slot = Some(self.active.len() as u32);
        self.active.push(idx);
        self.grid.insert(&mut self.resources, idx);
    }

    /// Take a resource out of the active list and the grid
    pub fn deactivate(&mut self, idx: u32) {
        let Some(slot) = self
            .resources
            .get_mut(idx as usize)
            .and_then(|r| r.active_slot.take())
        else {
            return;
        };
        let resources = &mut self.resources;
        swap_remove_relink(&mut self.active, slot as usize, |&moved, _, to| {
            resources[moved as usize].active_slot = Some(to as u32);
        });
        self.grid.remove(&mut self.resources, idx);
    }

    /// Move up to `max_amount` out of resource `idx`.
    ///
    /// Stale or depleted indices yield nothing.
    pub fn harvest(&mut self, idx: u32, max_amount: f32) -> HarvestOutcome {
        let Some(resource) = self.resources.get_mut(idx as usize) else {
            return HarvestOutcome::default();
        };
        if !resource.is_active() || resource.amt <= 0.0 || max_amount <= 0.0 {
            return HarvestOutcome::default();
        }
        let taken = resource.amt.min(max_amount);
        resource.amt -= taken;
        self.remaining_total -= taken as f64;
        let depleted = resource.amt <= 0.0;
        if depleted {
            resource.amt = 0.0;
            self.deactivate(idx);
        }
        HarvestOutcome { taken, depleted }
    }

    /// Nearest active resource within `range` of `pos`, scanning radar cells.
    /// Ties go to the first resource found.
    pub fn nearest_within(&self, pos: Vec2, range: f32) -> Option<u32> {
        let range_sq = range * range;
        let mut best = None;
        let mut best_dist = f32::INFINITY;
        for &cell in self.grid.radar_neighbors(self.grid.cell_of(pos)) {
            for &idx in self.grid.cell(cell) {
                let resource = &self.resources[idx as usize];
                if resource.amt <= 0.0 {
                    continue;
                }
                let dist = self.world.distance_sq(pos, resource.pos);
                if dist <= range_sq && dist < best_dist {
                    best = Some(idx);
                    best_dist = dist;
                }
            }
        }
        best
    }

    /// Whether a body of radius `reach` at `pos` touches active resource `idx`
    pub fn is_touching(&self, idx: u32, pos: Vec2, reach: f32) -> bool {
        match self.resources.get(idx as usize) {
            Some(r) if r.is_active() && r.amt > 0.0 => {
                let touch = reach + r.radius;
                self.world.distance_sq(pos, r.pos) <= touch * touch
            }
            _ => false,
        }
    }

    /// Nearest active resource touching a body of radius `reach`, scanning the 3x3 block
    pub fn nearest_touching(&self, pos: Vec2, reach: f32) -> Option<u32> {
        let mut best = None;
        let mut best_dist = f32::INFINITY;
        for &cell in self.grid.harvest_neighbors(self.grid.cell_of(pos)) {
            for &idx in self.grid.cell(cell) {
                let resource = &self.resources[idx as usize];
                if resource.amt <= 0.0 {
                    continue;
                }
                let touch = reach + resource.radius;
                let dist = self.world.distance_sq(pos, resource.pos);
                if dist <= touch * touch && dist < best_dist {
                    best = Some(idx);
                    best_dist = dist;
                }
            }
        }
        best
    }

    pub fn world(&self) -> World {
        self.world
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn get(&self, idx: u32) -> Option<&Resource> {
        self.resources.get(idx as usize)
    }

    pub fn is_active(&self, idx: u32) -> bool {
        self.get(idx).is_some_and(Resource::is_active)
    }

    pub fn active_indices(&self) -> &[u32] {
        &self.active
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn initial_total(&self) -> f64 {
        self.initial_total
    }

    pub fn remaining_total(&self) -> f64 {
        self.remaining_total
    }

    /// Harvested share of the system, `1 - remaining / initial`.
    /// An empty system counts as fully depleted.
    pub fn depletion(&self) -> f32 {
        if self.initial_total <= 0.0 {
            return 1.0;
        }
        (1.0 - self.remaining_total / self.initial_total).clamp(0.0, 1.0) as f32
    }

    pub fn remaining_fraction(&self) -> f32 {
        1.0 - self.depletion()
    }

    /// Panics unless totals, the active list and the grid agree
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let pool = self;
        let sum: f64 = pool.resources().iter().map(|r| r.amt as f64).sum();
        assert!(
            (sum - pool.remaining_total()).abs() <= 1e-6 * pool.initial_total().max(1.0),
            "remaining total {} drifted from sum {}",
            pool.remaining_total(),
            sum
        );
        let grid = pool.grid();
        for (idx, r) in pool.resources().iter().enumerate() {
            match (r.active_slot, r.grid_cell) {
                (Some(slot), Some(cell)) => {
                    assert_eq!(pool.active_indices()[slot as usize], idx as u32);
                    assert_eq!(cell, grid.cell_of(r.pos));
                    assert_eq!(grid.cell(cell)[r.grid_slot as usize], idx as u32);
                }
                (None, None) => {}
                other => panic!("resource {idx} half-active: {other:?}"),
            }
        }
        assert_eq!(grid.len(), pool.active_count());
    }
}
