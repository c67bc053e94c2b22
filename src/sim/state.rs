//! Simulation state
//!
//! Everything a tick reads or writes lives in `SimulationState`; there are
//! no ambient globals. Presentation reads it between ticks and never
//! mutates it.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::compact::swap_remove_relink;
use super::master::{MasterPhase, MasterState};
use super::probe::{Genes, Probe};
use super::resource::{ResourceKind, ResourcePool};
use super::select::Candidate;
use super::torus::World;
use crate::config::SimConfig;

/// Things that happened during the most recent tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    PhaseChanged { from: MasterPhase, to: MasterPhase },
    Replicated { parent: u32, child: u32 },
    Sacrificed { id: u32 },
    Warped { system_index: u32, survivors: usize },
}

/// Aggregate counts for HUDs and logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimStats {
    pub tick: u64,
    pub system_index: u32,
    pub phase: MasterPhase,
    pub population: usize,
    pub sacrificing: usize,
    pub active_resources: usize,
    pub remaining_percent: f32,
    pub sacrificed: u32,
    pub to_sacrifice: u32,
}

pub struct SimulationState {
    pub config: SimConfig,
    pub world: World,
    pub pool: ResourcePool,
    pub probes: Vec<Probe>,
    pub master: MasterState,
    /// Cleared at the start of every tick
    pub events: Vec<SimEvent>,
    pub time_ticks: u64,
    /// Number of warps so far
    pub system_index: u32,
    pub(crate) rng: Pcg32,
    /// Reused by sacrifice selection
    pub(crate) selection_scratch: Vec<Candidate>,
    focus: usize,
    player_slot: usize,
    next_id: u32,
    damping: f32,
}

impl SimulationState {
    /// New simulation seeded from the OS thread RNG.
    ///
    /// `config` is expected to have passed `SimConfig::validate`; the
    /// constructors do not re-check it. The player probe is spawned even
    /// when `initial_probes` is 0.
    pub fn new(config: SimConfig) -> Self {
        let rng = Pcg32::from_rng(&mut rand::rng());
        Self::build(config, rng, None)
    }

    /// New simulation with a fixed seed. Same precondition as `new`.
    pub fn with_seed(config: SimConfig, seed: u64) -> Self {
        Self::build(config, Pcg32::seed_from_u64(seed), None)
    }

    /// Seeded simulation whose first system is the given resource layout
    pub fn with_layout(config: SimConfig, seed: u64, layout: &[(ResourceKind, Vec2, f32)]) -> Self {
        Self::build(config, Pcg32::seed_from_u64(seed), Some(layout))
    }

    fn build(config: SimConfig, mut rng: Pcg32, layout: Option<&[(ResourceKind, Vec2, f32)]>) -> Self {
        let world = World::new(config.world_width, config.world_height);
        let pool = match layout {
            Some(layout) => ResourcePool::from_layout(&config, world, layout),
            None => {
                let mut pool = ResourcePool::new(&config, world);
                pool.spawn_system(&config, &mut rng);
                pool
            }
        };

        let center = world.center();
        let genes = Genes::base(&config);
        let mut probes = Vec::with_capacity(config.initial_probes);
        probes.push(Probe::new(Probe::PLAYER_ID, center, genes));
        for id in 1..config.initial_probes as u32 {
            let pos = world.random_point_near(&mut rng, center, config.initial_spread_radius);
            let mut probe = Probe::new(id, pos, genes.mutated(&config, &mut rng));
            probe.reset_behavior(&config, &mut rng);
            probes.push(probe);
        }

        log::info!(
            "Simulation ready: {}x{} world, {} probes, {} resources",
            world.width,
            world.height,
            probes.len(),
            pool.active_count()
        );

        Self {
            damping: config.damping_per_tick(),
            next_id: probes.len() as u32,
            config,
            world,
            pool,
            probes,
            master: MasterState::default(),
            events: Vec::new(),
            time_ticks: 0,
            system_index: 0,
            rng,
            selection_scratch: Vec::new(),
            focus: 0,
            player_slot: 0,
        }
    }

    /// Velocity damping for a tick of length `dt`
    pub fn damping_for(&self, dt: f32) -> f32 {
        if dt == self.config.sim_dt {
            self.damping
        } else {
            (-self.config.drag * dt).exp()
        }
    }

    pub fn player_slot(&self) -> usize {
        self.player_slot
    }

    pub fn player(&self) -> &Probe {
        &self.probes[self.player_slot]
    }

    pub fn player_mut(&mut self) -> &mut Probe {
        &mut self.probes[self.player_slot]
    }

    pub fn focus_slot(&self) -> usize {
        self.focus
    }

    /// Probe the camera follows
    pub fn focused(&self) -> &Probe {
        &self.probes[self.focus]
    }

    /// Move focus to the next living probe in collection order, wrapping
    pub fn cycle_focus(&mut self) {
        let n = self.probes.len();
        for step in 1..=n {
            let slot = (self.focus + step) % n;
            if self.probes[slot].alive {
                self.focus = slot;
                return;
            }
        }
    }

    pub fn population(&self) -> usize {
        self.probes.iter().filter(|p| p.alive).count()
    }

    /// Spawn a child of the probe in `slot` if every replication gate passes.
    ///
    /// Gates: Master AI in its normal phase, population below the cap, and
    /// the parent able to pay. A refused request is a normal outcome.
    pub fn try_replicate(&mut self, slot: usize) -> bool {
        if self.master.phase != MasterPhase::Normal {
            return false;
        }
        if self.probes.len() >= self.config.max_probes {
            log::debug!("Replication dropped at population cap {}", self.config.max_probes);
            return false;
        }
        let child_id = self.next_id;
        let Some(parent) = self.probes.get_mut(slot) else {
            return false;
        };
        let Some(child) = parent.spawn_child(child_id, &self.config, self.world, &mut self.rng)
        else {
            return false;
        };
        let parent_id = parent.id;
        self.next_id += 1;
        self.probes.push(child);
        self.events.push(SimEvent::Replicated {
            parent: parent_id,
            child: child_id,
        });
        true
    }

    /// Remove dead probes, crediting finished sacrifices to the Master AI
    pub fn compact_dead(&mut self) {
        let mut slot = 0;
        while slot < self.probes.len() {
            if self.probes[slot].alive {
                slot += 1;
                continue;
            }
            let lost_focus = self.focus == slot;
            let focus = &mut self.focus;
            let player = &mut self.player_slot;
            let dead = swap_remove_relink(&mut self.probes, slot, |_, from, to| {
                if *focus == from {
                    *focus = to;
                }
                if *player == from {
                    *player = to;
                }
            });
            if lost_focus {
                self.focus = self.player_slot;
            }
            if dead.sacrificing {
                self.master.sacrificed += 1;
                self.events.push(SimEvent::Sacrificed { id: dead.id });
            }
        }
    }

    pub fn stats(&self) -> SimStats {
        SimStats {
            tick: self.time_ticks,
            system_index: self.system_index,
            phase: self.master.phase,
            population: self.population(),
            sacrificing: self.probes.iter().filter(|p| p.alive && p.sacrificing).count(),
            active_resources: self.pool.active_count(),
            remaining_percent: self.pool.remaining_fraction() * 100.0,
            sacrificed: self.master.sacrificed,
            to_sacrifice: self.master.to_sacrifice,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SimConfig {
        SimConfig {
            world_width: 3000.0,
            world_height: 3000.0,
            initial_probes: 20,
            max_probes: 25,
            common_count: 100,
            rich_count: 10,
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_initial_population() {
        let state = SimulationState::with_seed(small_config(), 1);
        assert_eq!(state.probes.len(), 20);
        assert!(state.player().is_player());
        assert_eq!(state.player().pos, state.world.center());
        assert_eq!(state.probes.iter().filter(|p| p.is_player()).count(), 1);
        let mut ids: Vec<u32> = state.probes.iter().map(|p| p.id).collect();
        ids.dedup();
        assert_eq!(ids, (0..20).collect::<Vec<_>>());
        assert_eq!(state.pool.active_count(), 110);
    }

    #[test]
    fn test_player_exists_without_initial_probes() {
        let config = SimConfig {
            initial_probes: 0,
            ..small_config()
        };
        assert!(config.validate().is_err());
        let mut state = SimulationState::with_seed(config, 8);
        assert_eq!(state.probes.len(), 1);
        assert!(state.player().is_player());
        assert!(state.focused().is_player());
        state.cycle_focus();
        assert_eq!(state.focus_slot(), 0);
    }

    #[test]
    fn test_replication_gates() {
        let config = small_config();
        let cost = config.replication_cost;
        let start = config.child_start_resources;
        let mut state = SimulationState::with_seed(config, 2);

        state.probes[3].resources_carried = cost - 1.0;
        assert!(!state.try_replicate(3));
        assert_eq!(state.probes.len(), 20);
        assert_eq!(state.probes[3].resources_carried, cost - 1.0);

        state.probes[3].resources_carried = cost;
        assert!(state.try_replicate(3));
        assert_eq!(state.probes.len(), 21);
        assert_eq!(state.probes[3].resources_carried, 0.0);
        let child = state.probes.last().expect("child was pushed");
        assert_eq!(child.id, 20);
        assert_eq!(child.resources_carried, start);
        assert_eq!(
            state.events,
            vec![SimEvent::Replicated { parent: state.probes[3].id, child: 20 }]
        );

        // Outside the normal phase nobody replicates
        state.master.phase = MasterPhase::Rally;
        state.probes[4].resources_carried = cost * 2.0;
        assert!(!state.try_replicate(4));
    }

    #[test]
    fn test_population_cap_drops_requests() {
        let mut state = SimulationState::with_seed(small_config(), 3);
        for slot in 0..state.probes.len() {
            state.probes[slot].resources_carried = 1_000.0;
        }
        let mut made = 0;
        for slot in 0..20 {
            if state.try_replicate(slot) {
                made += 1;
            }
        }
        assert_eq!(made, 5);
        assert_eq!(state.probes.len(), 25);
    }

    #[test]
    fn test_compaction_counts_sacrifices_and_keeps_player() {
        let mut state = SimulationState::with_seed(small_config(), 4);
        // Kill the player's neighbors including the last slot
        for slot in [1, 5, 19] {
            state.probes[slot].begin_sacrifice(Vec2::ZERO, 1.0);
            state.probes[slot].alive = false;
        }
        state.compact_dead();
        assert_eq!(state.probes.len(), 17);
        assert_eq!(state.master.sacrificed, 3);
        assert!(state.probes.iter().all(|p| p.alive));
        assert!(state.player().is_player());
        assert_eq!(state.events.len(), 3);
    }

    #[test]
    fn test_focus_follows_moved_probe_and_falls_back_to_player() {
        let mut state = SimulationState::with_seed(small_config(), 5);
        // Focus the last probe, then kill slot 2 so the last one moves there
        while state.focus_slot() != 19 {
            state.cycle_focus();
        }
        let focused_id = state.focused().id;
        state.probes[2].alive = false;
        state.compact_dead();
        assert_eq!(state.focus_slot(), 2);
        assert_eq!(state.focused().id, focused_id);

        // Killing the focused probe returns focus to the player
        state.probes[2].alive = false;
        state.compact_dead();
        assert!(state.focused().is_player());
    }

    #[test]
    fn test_cycle_focus_skips_dead() {
        let mut state = SimulationState::with_seed(small_config(), 6);
        state.probes[1].alive = false;
        state.probes[2].alive = false;
        state.cycle_focus();
        assert_eq!(state.focus_slot(), 3);
        for _ in 0..17 {
            state.cycle_focus();
        }
        assert_eq!(state.focus_slot(), 0);
    }

    #[test]
    fn test_stats_reflect_state() {
        let state = SimulationState::with_seed(small_config(), 7);
        let stats = state.stats();
        assert_eq!(stats.population, 20);
        assert_eq!(stats.phase, MasterPhase::Normal);
        assert_eq!(stats.active_resources, 110);
        assert!((stats.remaining_percent - 100.0).abs() < 1e-3);
        let json = serde_json::to_string(&stats).expect("stats serialize");
        assert!(json.contains("\"population\":20"));
    }
}
